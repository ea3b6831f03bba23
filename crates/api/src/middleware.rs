//! API middleware.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use votebox_common::{AppError, config::AuthConfig};
use votebox_core::{AccessGuard, GuardDecision, IdentityService, PollService, VoteService};
use votebox_db::entities::user;

use crate::{extractors::wants_html, sse::TallyBroadcaster};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub identity_service: IdentityService,
    pub poll_service: PollService,
    pub vote_service: VoteService,
    pub tally_broadcaster: TallyBroadcaster,
    pub auth: AuthConfig,
}

/// Pull the session token from the `Authorization` header, falling back to
/// the session cookie.
fn session_token(req: &Request<Body>, cookie_name: &str) -> Option<String> {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    CookieJar::from_headers(req.headers())
        .get(cookie_name)
        .map(|c| c.value().to_string())
}

/// Authentication middleware.
///
/// Resolves the session token, if any, and stores the user in the request
/// extensions for [`crate::extractors::AuthUser`]. Never rejects.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = session_token(&req, &state.auth.cookie_name) {
        match state.identity_service.current_user(&token).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(user);
            }
            Ok(None) => tracing::debug!("Unknown session token"),
            Err(e) => tracing::warn!(error = %e, "Session lookup failed"),
        }
    }

    next.run(req).await
}

/// Access guard for protected routes.
///
/// Browsers are sent to the login page with `303 See Other`; API clients get
/// `401` with the JSON error body.
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let user = req.extensions().get::<user::Model>().cloned();
    let mut guard = AccessGuard::new(state.auth.login_path.as_str());

    match guard.resolve(user) {
        GuardDecision::Render(_) => next.run(req).await,
        GuardDecision::Redirect(target) if wants_html(req.headers()) => {
            Redirect::to(&target).into_response()
        }
        _ => AppError::Unauthorized.into_response(),
    }
}
