//! Poll service.
//!
//! Creation is a two-step write (poll row, then its options) with a single
//! compensating delete. Editing replaces the option set wholesale and has no
//! rollback.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use votebox_common::{AppError, AppResult, IdGenerator};
use votebox_db::{
    entities::{poll, poll_option, user},
    repositories::{PollOptionRepository, PollRepository, VoteRepository},
};

use crate::services::{
    event_publisher::PollEventPublisherService,
    tally::{self, PollTally, TallyCache},
};

/// Number of option slots the create form offers. Extra entries are ignored.
pub const CREATE_OPTION_SLOTS: usize = 4;

/// Input for creating a poll.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePollInput {
    pub title: String,
    /// Raw option slots, blanks included.
    pub options: Vec<String>,
}

/// Input for editing a poll.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdatePollInput {
    pub question: String,
    pub options: Vec<String>,
}

/// A poll with its options in display order.
#[derive(Debug, Clone)]
pub struct PollWithOptions {
    pub poll: poll::Model,
    pub options: Vec<poll_option::Model>,
}

/// A poll, its options and the tally for one viewer.
#[derive(Debug, Clone)]
pub struct PollDetail {
    pub poll: poll::Model,
    pub options: Vec<poll_option::Model>,
    pub tally: PollTally,
}

/// Trim the question; blank is rejected.
pub fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    Ok(title.to_string())
}

/// Trim every entry and drop blank ones; at least two must remain.
pub fn validate_options(raw: &[String]) -> AppResult<Vec<String>> {
    let options: Vec<String> = raw
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(ToString::to_string)
        .collect();

    if options.len() < 2 {
        return Err(AppError::Validation(
            "At least two options are required".to_string(),
        ));
    }
    Ok(options)
}

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    option_repo: PollOptionRepository,
    vote_repo: VoteRepository,
    tally_cache: Arc<TallyCache>,
    event_publisher: Option<PollEventPublisherService>,
    id_gen: IdGenerator,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        option_repo: PollOptionRepository,
        vote_repo: VoteRepository,
        tally_cache: Arc<TallyCache>,
    ) -> Self {
        Self {
            poll_repo,
            option_repo,
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

    fn build_options(&self, poll_id: &str, texts: Vec<String>) -> Vec<poll_option::Model> {
        texts
            .into_iter()
            .enumerate()
            .map(|(position, text)| poll_option::Model {
                id: self.id_gen.generate(),
                text,
                poll_id: poll_id.to_string(),
                position: position as i32,
            })
            .collect()
    }

    /// Create a poll from the create form.
    ///
    /// If the options cannot be stored the poll row is deleted again so no
    /// option-less poll is left behind.
    pub async fn create_poll(
        &self,
        viewer: Option<&user::Model>,
        input: CreatePollInput,
    ) -> AppResult<PollWithOptions> {
        let title = validate_title(&input.title)?;
        let slots: Vec<String> = input
            .options
            .into_iter()
            .take(CREATE_OPTION_SLOTS)
            .collect();
        let texts = validate_options(&slots)?;

        let viewer = viewer.ok_or(AppError::Unauthorized)?;

        let poll = self
            .poll_repo
            .create(poll::Model {
                id: self.id_gen.generate(),
                question: title,
                user_id: viewer.id.clone(),
                created_at: Utc::now().into(),
            })
            .await?;

        let options = self.build_options(&poll.id, texts);
        let options = match self.option_repo.create_many(options).await {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!(error = %e, poll_id = %poll.id, "Option insert failed, removing poll");
                if let Err(cleanup) = self.poll_repo.delete(&poll.id).await {
                    tracing::error!(
                        error = %cleanup,
                        poll_id = %poll.id,
                        "Failed to delete poll after option insert failure"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(poll_id = %poll.id, user_id = %viewer.id, options = options.len(), "Poll created");
        Ok(PollWithOptions { poll, options })
    }

    /// Edit a poll's question and replace its options.
    ///
    /// Existing options are deleted before the new ones are inserted; their
    /// votes go with them. A failed insert after the delete is not rolled
    /// back.
    pub async fn update_poll(
        &self,
        viewer: Option<&user::Model>,
        poll_id: &str,
        input: UpdatePollInput,
    ) -> AppResult<PollWithOptions> {
        let question = validate_title(&input.question)?;
        let texts = validate_options(&input.options)?;

        let viewer = viewer.ok_or(AppError::Unauthorized)?;

        let mut poll = self.poll_repo.get_by_id(poll_id).await?;
        if poll.user_id != viewer.id {
            return Err(AppError::Forbidden(
                "You can only edit your own polls".to_string(),
            ));
        }

        self.poll_repo.update_question(poll_id, &question).await?;
        poll.question = question;

        self.option_repo.delete_by_poll(poll_id).await?;

        let options = self.build_options(poll_id, texts);
        let created = self.option_repo.create_many(options).await;

        // A read between delete and insert may have cached an option-less tally
        self.invalidate(poll_id).await;

        let options = created.inspect_err(|e| {
            tracing::error!(error = %e, %poll_id, "Poll left without options after failed edit");
        })?;

        tracing::info!(%poll_id, user_id = %viewer.id, options = options.len(), "Poll updated");
        Ok(PollWithOptions { poll, options })
    }

    /// Delete a poll with its votes and options, in that order.
    pub async fn delete_poll(&self, viewer: Option<&user::Model>, poll_id: &str) -> AppResult<()> {
        let viewer = viewer.ok_or(AppError::Unauthorized)?;

        let poll = self.poll_repo.get_by_id(poll_id).await?;
        if poll.user_id != viewer.id {
            return Err(AppError::Forbidden(
                "You can only delete your own polls".to_string(),
            ));
        }

        self.vote_repo.delete_by_poll(poll_id).await?;
        self.option_repo.delete_by_poll(poll_id).await?;
        self.poll_repo.delete(poll_id).await?;
        self.invalidate(poll_id).await;

        tracing::info!(%poll_id, user_id = %viewer.id, "Poll deleted");
        Ok(())
    }

    /// List every poll, newest first.
    pub async fn list_polls(&self) -> AppResult<Vec<poll::Model>> {
        self.poll_repo.list_recent().await
    }

    /// Get a poll by ID.
    pub async fn get_poll(&self, poll_id: &str) -> AppResult<poll::Model> {
        self.poll_repo.get_by_id(poll_id).await
    }

    /// Get a poll with its options and a fresh tally for `viewer`.
    pub async fn get_poll_detail(
        &self,
        poll_id: &str,
        viewer: Option<&user::Model>,
    ) -> AppResult<PollDetail> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let options = self.option_repo.find_by_poll(poll_id).await?;
        let votes = self.vote_repo.find_by_poll(poll_id).await?;

        let tally = tally::compute(poll_id, &options, &votes, viewer.map(|u| u.id.as_str()));
        self.tally_cache.store_authoritative(&tally).await;

        Ok(PollDetail {
            poll,
            options,
            tally,
        })
    }

    /// Get the shared tally of a poll, from the cache when possible.
    ///
    /// A cached entry that does not know `option_id` is bypassed and
    /// replaced from storage.
    pub async fn load_tally(&self, poll_id: &str, option_id: Option<&str>) -> AppResult<PollTally> {
        let option_id = option_id.map(str::trim).filter(|id| !id.is_empty());
        if let Some(cached) = self.tally_cache.get(poll_id).await
            && option_id.is_none_or(|id| cached.tally.contains_option(id))
        {
            return Ok(cached.tally);
        }
        Ok(self.get_poll_detail(poll_id, None).await?.tally)
    }

    async fn invalidate(&self, poll_id: &str) {
        self.tally_cache.invalidate(poll_id).await;
        if let Some(ref event_publisher) = self.event_publisher
            && let Err(e) = event_publisher.publish_invalidated(poll_id).await
        {
            tracing::warn!(error = %e, %poll_id, "Failed to publish poll invalidation");
        }
    }
}
