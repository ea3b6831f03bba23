//! Business logic services.

pub mod access_guard;
pub mod event_publisher;
pub mod identity;
pub mod poll;
pub mod tally;
pub mod vote;

pub use access_guard::{AccessGuard, GuardDecision, GuardState, IdentitySignal};
pub use event_publisher::{NoOpPollEventPublisher, PollEventPublisher, PollEventPublisherService};
pub use identity::{AuthEvent, IdentityService, Session, SignUpInput};
pub use poll::{
    CREATE_OPTION_SLOTS, CreatePollInput, PollDetail, PollService, PollWithOptions,
    UpdatePollInput,
};
pub use tally::{CachedTally, OptionTally, PollTally, TallyCache, TallyState};
pub use vote::VoteService;
