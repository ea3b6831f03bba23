//! Core business logic for votebox: tallying, vote submission, poll
//! workflows, identity and the access guard.

pub mod services;

pub use services::*;
