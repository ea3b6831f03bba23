//! Identity service: accounts, sessions and auth-change events.
//!
//! Sessions are opaque tokens stored on the user row. Every sign-in and
//! sign-out is announced on a single broadcast channel so long-lived
//! consumers (live tally streams) can react to a session ending.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::broadcast;
use validator::Validate;
use votebox_common::{AppError, AppResult, IdGenerator, config::AuthConfig};
use votebox_db::{entities::user, repositories::UserRepository};

/// Capacity of the auth event channel.
const AUTH_EVENT_CAPACITY: usize = 256;

/// A change in someone's authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: String },
    SignedOut { user_id: String },
}

/// Input for registering a new account.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpInput {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(max = 128))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords don't match"))]
    pub confirm_password: String,
}

/// A signed-in user and the token that identifies the session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: user::Model,
    pub token: String,
}

/// Identity service for business logic.
#[derive(Clone)]
pub struct IdentityService {
    user_repo: UserRepository,
    events: broadcast::Sender<AuthEvent>,
    min_password_length: usize,
    id_gen: IdGenerator,
}

impl IdentityService {
    /// Create a new identity service.
    #[must_use]
    pub fn new(user_repo: UserRepository, config: &AuthConfig) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            user_repo,
            events,
            min_password_length: config.min_password_length,
            id_gen: IdGenerator::new(),
        }
    }

    /// Subscribe to sign-in and sign-out events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: AuthEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Register a new account. The caller signs in separately.
    pub async fn sign_up(&self, input: SignUpInput) -> AppResult<user::Model> {
        input.validate()?;

        if input.password.chars().count() < self.min_password_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }

        let email = input.email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&input.password)?;

        let user = self
            .user_repo
            .create(user::Model {
                id: self.id_gen.generate(),
                email,
                name: input.name.trim().to_string(),
                password_hash,
                token: None,
                created_at: Utc::now().into(),
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Check credentials and start a new session.
    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let Some(mut user) = self.user_repo.find_by_email(email.trim()).await? else {
            return Err(AppError::Unauthorized);
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "Rejected sign-in");
            return Err(AppError::Unauthorized);
        }

        let token = self.id_gen.generate_token();
        self.user_repo.set_token(&user.id, Some(token.clone())).await?;
        user.token = Some(token.clone());

        self.publish(AuthEvent::SignedIn {
            user_id: user.id.clone(),
        });
        tracing::info!(user_id = %user.id, "User signed in");

        Ok(Session { user, token })
    }

    /// End the user's session. The old token stops resolving immediately.
    pub async fn sign_out(&self, user: &user::Model) -> AppResult<()> {
        self.user_repo.set_token(&user.id, None).await?;

        self.publish(AuthEvent::SignedOut {
            user_id: user.id.clone(),
        });
        tracing::info!(user_id = %user.id, "User signed out");
        Ok(())
    }

    /// Resolve a session token to its user.
    pub async fn current_user(&self, token: &str) -> AppResult<Option<user::Model>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.user_repo.find_by_token(token).await
    }
}

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn ok_exec() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn create_test_user(password: &str) -> user::Model {
        user::Model {
            id: "user1".to_string(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            password_hash: hash_password(password).unwrap(),
            token: None,
            created_at: Utc::now().into(),
        }
    }

    fn sign_up_input(password: &str, confirm: &str) -> SignUpInput {
        SignUpInput {
            name: "Alice".to_string(),
            email: "Alice@Example.com".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    fn service_with(db: MockDatabase) -> IdentityService {
        IdentityService::new(
            UserRepository::new(Arc::new(db.into_connection())),
            &AuthConfig::default(),
        )
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_up_password_mismatch() {
        let service = service_with(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .sign_up(sign_up_input("password123", "password124"))
            .await;

        match result {
            Err(AppError::Validation(msg)) => assert!(msg.contains("Passwords don't match")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sign_up_short_password() {
        let service = service_with(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service.sign_up(sign_up_input("short", "short")).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_email_conflicts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("password123")]]);
        let service = service_with(db);

        let result = service
            .sign_up(sign_up_input("password123", "password123"))
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_sign_up_stores_lowercase_email_and_hash() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_exec_results([ok_exec()]);
        let service = service_with(db);

        let user = service
            .sign_up(sign_up_input("password123", "password123"))
            .await
            .unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert!(user.token.is_none());
        assert!(verify_password("password123", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_sign_in_issues_token_and_publishes() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("password123")]])
            .append_exec_results([ok_exec()]);
        let service = service_with(db);
        let mut events = service.subscribe();

        let session = service
            .sign_in("alice@example.com", "password123")
            .await
            .unwrap();

        assert_eq!(session.user.token.as_deref(), Some(session.token.as_str()));
        assert_eq!(
            events.recv().await.unwrap(),
            AuthEvent::SignedIn {
                user_id: "user1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("password123")]]);
        let service = service_with(db);

        let result = service.sign_in("alice@example.com", "nope").await;

        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_sign_in_unknown_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);
        let service = service_with(db);

        let result = service.sign_in("nobody@example.com", "password123").await;

        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_sign_out_reaches_every_subscriber() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([ok_exec()]);
        let service = service_with(db);
        let mut first = service.subscribe();
        let mut second = service.subscribe();
        let user = create_test_user("password123");

        service.sign_out(&user).await.unwrap();

        let expected = AuthEvent::SignedOut {
            user_id: "user1".to_string(),
        };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_current_user_empty_token() {
        let service = service_with(MockDatabase::new(DatabaseBackend::Postgres));

        assert!(service.current_user("").await.unwrap().is_none());
    }
}
