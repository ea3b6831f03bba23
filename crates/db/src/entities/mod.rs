//! Database entities.

#![allow(missing_docs)]

pub mod poll;
pub mod poll_option;
pub mod user;
pub mod vote;

pub use poll::Entity as Poll;
pub use poll_option::Entity as PollOption;
pub use user::Entity as User;
pub use vote::Entity as Vote;
