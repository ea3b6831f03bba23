//! API endpoints.

mod auth;
pub mod polls;

use axum::{Router, middleware};

use crate::middleware::{AppState, auth_middleware};

/// Create the API router with state and authentication applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/auth", auth::router(&state))
        .nest("/polls", polls::router(&state))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
