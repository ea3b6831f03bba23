//! Poll event publisher.
//!
//! Lets the poll and vote services announce tally changes without knowing
//! how they reach subscribers. The API crate provides the SSE-backed
//! implementation.

use std::sync::Arc;

use async_trait::async_trait;
use votebox_common::AppResult;

use crate::services::tally::PollTally;

/// Trait for publishing poll events.
#[async_trait]
pub trait PollEventPublisher: Send + Sync {
    /// Publish the tally after a vote was recorded.
    async fn publish_tally(&self, tally: &PollTally) -> AppResult<()>;

    /// Publish that a poll's options changed or the poll is gone.
    async fn publish_invalidated(&self, poll_id: &str) -> AppResult<()>;
}

/// A no-op implementation of [`PollEventPublisher`] for tests or when live
/// tallies are disabled.
#[derive(Clone, Default)]
pub struct NoOpPollEventPublisher;

#[async_trait]
impl PollEventPublisher for NoOpPollEventPublisher {
    async fn publish_tally(&self, _tally: &PollTally) -> AppResult<()> {
        Ok(())
    }

    async fn publish_invalidated(&self, _poll_id: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed [`PollEventPublisher`] trait object.
pub type PollEventPublisherService = Arc<dyn PollEventPublisher>;
