//! Vote submission.

use std::sync::Arc;

use chrono::Utc;
use votebox_common::{AppError, AppResult, IdGenerator};
use votebox_db::{
    entities::{user, vote},
    repositories::VoteRepository,
};

use crate::services::{
    event_publisher::PollEventPublisherService,
    tally::{PollTally, TallyCache},
};

/// Vote service for business logic.
#[derive(Clone)]
pub struct VoteService {
    vote_repo: VoteRepository,
    tally_cache: Arc<TallyCache>,
    event_publisher: Option<PollEventPublisherService>,
    id_gen: IdGenerator,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub const fn new(vote_repo: VoteRepository, tally_cache: Arc<TallyCache>) -> Self {
        Self {
            vote_repo,
            tally_cache,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher for live tallies.
    pub fn set_event_publisher(&mut self, event_publisher: PollEventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Cast the viewer's vote and bump `tally` once storage accepts it.
    ///
    /// The increment is applied to the shared cached tally, and `tally` is
    /// replaced by the result, so it also reflects votes cast since it was
    /// loaded.
    ///
    /// Storage is not asked whether the viewer already voted; the unique
    /// `(user_id, poll_id)` index rejects a second vote and that rejection
    /// comes back as a votes storage error with `tally` untouched.
    pub async fn submit(
        &self,
        viewer: Option<&user::Model>,
        poll_id: &str,
        option_id: Option<&str>,
        tally: &mut PollTally,
    ) -> AppResult<vote::Model> {
        let option_id = option_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Validation("Please select an option".to_string()))?;

        let viewer = viewer.ok_or(AppError::Unauthorized)?;

        if tally.poll_id != poll_id || !tally.contains_option(option_id) {
            return Err(AppError::NotFound(format!("Poll option not found: {option_id}")));
        }

        let model = vote::Model {
            id: self.id_gen.generate(),
            option_id: option_id.to_string(),
            user_id: viewer.id.clone(),
            poll_id: poll_id.to_string(),
            created_at: Utc::now().into(),
        };

        let vote = match self.vote_repo.create(model).await {
            Ok(vote) => vote,
            Err(e) => {
                tracing::warn!(error = %e, %poll_id, user_id = %viewer.id, "Vote rejected");
                return Err(e);
            }
        };

        let shared = self
            .tally_cache
            .apply_vote(tally, &vote.option_id, &vote.user_id)
            .await;
        *tally = PollTally {
            has_voted: true,
            viewer_choice: Some(vote.option_id.clone()),
            ..shared.clone()
        };

        if let Some(ref event_publisher) = self.event_publisher
            && let Err(e) = event_publisher.publish_tally(&shared).await
        {
            tracing::warn!(error = %e, %poll_id, "Failed to publish tally");
        }

        tracing::info!(%poll_id, user_id = %vote.user_id, option_id = %vote.option_id, "Vote recorded");
        Ok(vote)
    }
}
