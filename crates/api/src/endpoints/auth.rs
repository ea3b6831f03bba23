//! Authentication endpoints.

use axum::{
    Json, Router,
    extract::State,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use votebox_common::AppResult;
use votebox_core::SignUpInput;
use votebox_db::entities::user;

use crate::{
    extractors::AuthUser,
    middleware::{AppState, require_auth},
    response::{self, ApiResponse},
};

/// User response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

/// Create a new account.
async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignUpInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.identity_service.sign_up(req).await?;
    Ok(ApiResponse::created(user.into()))
}

/// Signin request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// Signin response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub token: String,
}

/// Sign in and set the session cookie.
async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SigninRequest>,
) -> AppResult<(CookieJar, ApiResponse<SigninResponse>)> {
    let session = state
        .identity_service
        .sign_in(&req.email, &req.password)
        .await?;

    let cookie = Cookie::build((state.auth.cookie_name.clone(), session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((
        jar.add(cookie),
        ApiResponse::ok(SigninResponse {
            user: session.user.into(),
            token: session.token,
        }),
    ))
}

/// End the current session and clear the cookie.
async fn signout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    state.identity_service.sign_out(&user).await?;

    let jar = jar.remove(Cookie::build((state.auth.cookie_name.clone(), "")).path("/"));
    Ok((jar, response::ok()))
}

/// Current user.
async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(user.into())
}

pub fn router(state: &AppState) -> Router<AppState> {
    let guard = middleware::from_fn_with_state(state.clone(), require_auth);

    Router::new()
        .route("/signout", post(signout))
        .route("/me", get(me))
        .route_layer(guard)
        .route("/signup", post(signup))
        .route("/signin", post(signin))
}
