//! Vote repository.

use std::sync::Arc;

use crate::entities::{Vote, vote};
use sea_orm::{ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use votebox_common::{AppError, AppResult, StorageCategory};

fn storage_err(e: sea_orm::DbErr) -> AppError {
    AppError::storage(StorageCategory::Votes, e)
}

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get every vote cast on a poll.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .all(self.db.as_ref())
            .await
            .map_err(storage_err)
    }

    /// Insert a vote.
    ///
    /// A second vote by the same user on the same poll is rejected by the
    /// `(user_id, poll_id)` unique index and surfaces here as a storage error.
    pub async fn create(&self, model: vote::Model) -> AppResult<vote::Model> {
        let active = vote::ActiveModel {
            id: Set(model.id.clone()),
            option_id: Set(model.option_id.clone()),
            user_id: Set(model.user_id.clone()),
            poll_id: Set(model.poll_id.clone()),
            created_at: Set(model.created_at),
        };

        Vote::insert(active)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(storage_err)?;

        Ok(model)
    }

    /// Delete every vote on a poll. Returns the number of rows removed.
    pub async fn delete_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::PollId.eq(poll_id))
            .exec(self.db.as_ref())
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected)
    }
}
