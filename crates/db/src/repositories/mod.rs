//! Repositories: table-scoped reads and writes.
//!
//! Every failure is reported as [`AppError::Storage`](votebox_common::AppError)
//! tagged with the table it touched.

mod poll;
mod poll_option;
mod user;
mod vote;

pub use poll::PollRepository;
pub use poll_option::PollOptionRepository;
pub use user::UserRepository;
pub use vote::VoteRepository;
