//! Poll option repository.

use std::sync::Arc;

use crate::entities::{PollOption, poll_option};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use votebox_common::{AppError, AppResult, StorageCategory};

fn storage_err(e: sea_orm::DbErr) -> AppError {
    AppError::storage(StorageCategory::Options, e)
}

/// Poll option repository for database operations.
#[derive(Clone)]
pub struct PollOptionRepository {
    db: Arc<DatabaseConnection>,
}

impl PollOptionRepository {
    /// Create a new poll option repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get a poll's options in form order.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(storage_err)
    }

    /// Insert a batch of options in a single statement.
    pub async fn create_many(
        &self,
        models: Vec<poll_option::Model>,
    ) -> AppResult<Vec<poll_option::Model>> {
        if models.is_empty() {
            return Ok(models);
        }

        let actives = models.iter().map(|m| poll_option::ActiveModel {
            id: Set(m.id.clone()),
            text: Set(m.text.clone()),
            poll_id: Set(m.poll_id.clone()),
            position: Set(m.position),
        });

        PollOption::insert_many(actives)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(storage_err)?;

        Ok(models)
    }

    /// Delete every option of a poll. Returns the number of rows removed.
    pub async fn delete_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        let result = PollOption::delete_many()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .exec(self.db.as_ref())
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected)
    }
}
