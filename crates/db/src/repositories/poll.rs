//! Poll repository.

use std::sync::Arc;

use crate::entities::{Poll, poll};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    sea_query::Expr,
};
use votebox_common::{AppError, AppResult, StorageCategory};

fn storage_err(e: sea_orm::DbErr) -> AppError {
    AppError::storage(StorageCategory::Poll, e)
}

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(storage_err)
    }

    /// Get a poll by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll not found: {id}")))
    }

    /// List all polls, newest first.
    pub async fn list_recent(&self) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .order_by_desc(poll::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(storage_err)
    }

    /// Insert a poll row.
    pub async fn create(&self, model: poll::Model) -> AppResult<poll::Model> {
        let active = poll::ActiveModel {
            id: Set(model.id.clone()),
            question: Set(model.question.clone()),
            user_id: Set(model.user_id.clone()),
            created_at: Set(model.created_at),
        };

        Poll::insert(active)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(storage_err)?;

        Ok(model)
    }

    /// Change a poll's question text.
    pub async fn update_question(&self, id: &str, question: &str) -> AppResult<()> {
        let result = Poll::update_many()
            .col_expr(poll::Column::Question, Expr::value(question))
            .filter(poll::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(storage_err)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Poll not found: {id}")));
        }
        Ok(())
    }

    /// Delete a poll.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Poll::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    fn create_test_poll(id: &str, user_id: &str) -> poll::Model {
        poll::Model {
            id: id.to_string(),
            question: "Favorite language?".to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_found() {
        let poll = create_test_poll("poll1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll.clone()]])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let found = repo.get_by_id("poll1").await.unwrap();

        assert_eq!(found, poll);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<poll::Model>::new()])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_recent() {
        let newer = create_test_poll("poll2", "user1");
        let older = create_test_poll("poll1", "user2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[newer, older]])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let polls = repo.list_recent().await.unwrap();

        assert_eq!(polls.len(), 2);
        assert_eq!(polls[0].id, "poll2");
    }

    #[tokio::test]
    async fn test_update_question_missing_row() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let result = repo.update_question("missing", "New?").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_failure_is_poll_storage_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_errors([DbErr::Custom("connection reset".into())])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let result = repo.create(create_test_poll("poll1", "user1")).await;

        assert!(matches!(
            result,
            Err(AppError::Storage {
                category: StorageCategory::Poll,
                ..
            })
        ));
    }
}
