//! Poll endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use votebox_common::{AppError, AppResult};
use votebox_core::{
    CREATE_OPTION_SLOTS, CreatePollInput, OptionTally, PollDetail, PollTally, PollWithOptions,
    UpdatePollInput,
};
use votebox_db::entities::{poll, poll_option, vote};

use crate::{
    extractors::{AcceptsHtml, AuthUser, MaybeAuthUser},
    middleware::{AppState, require_auth},
    response::{self, ApiResponse},
    sse,
};

/// Poll response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub id: String,
    pub question: String,
    pub user_id: String,
    pub created_at: String,
}

impl From<poll::Model> for PollResponse {
    fn from(poll: poll::Model) -> Self {
        Self {
            id: poll.id,
            question: poll.question,
            user_id: poll.user_id,
            created_at: poll.created_at.to_rfc3339(),
        }
    }
}

/// Poll option response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResponse {
    pub id: String,
    pub text: String,
    pub position: i32,
}

impl From<poll_option::Model> for OptionResponse {
    fn from(option: poll_option::Model) -> Self {
        Self {
            id: option.id,
            text: option.text,
            position: option.position,
        }
    }
}

/// Per-option tally response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTallyResponse {
    pub option_id: String,
    pub text: String,
    pub count: u64,
    pub percentage: f64,
    /// One-decimal display form, e.g. `"33.3"`.
    pub percentage_label: String,
}

impl From<&OptionTally> for OptionTallyResponse {
    fn from(tally: &OptionTally) -> Self {
        Self {
            option_id: tally.option_id.clone(),
            text: tally.text.clone(),
            count: tally.count,
            percentage: tally.percentage,
            percentage_label: tally.percentage_label(),
        }
    }
}

/// Tally response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyResponse {
    pub poll_id: String,
    pub options: Vec<OptionTallyResponse>,
    pub total_votes: u64,
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_choice: Option<String>,
}

impl From<&PollTally> for TallyResponse {
    fn from(tally: &PollTally) -> Self {
        Self {
            poll_id: tally.poll_id.clone(),
            options: tally.options.iter().map(Into::into).collect(),
            total_votes: tally.total_votes,
            has_voted: tally.has_voted,
            viewer_choice: tally.viewer_choice.clone(),
        }
    }
}

/// Poll with options response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollWithOptionsResponse {
    #[serde(flatten)]
    pub poll: PollResponse,
    pub options: Vec<OptionResponse>,
}

impl From<PollWithOptions> for PollWithOptionsResponse {
    fn from(p: PollWithOptions) -> Self {
        Self {
            poll: p.poll.into(),
            options: p.options.into_iter().map(Into::into).collect(),
        }
    }
}

/// Poll detail response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDetailResponse {
    #[serde(flatten)]
    pub poll: PollResponse,
    pub options: Vec<OptionResponse>,
    pub tally: TallyResponse,
}

impl From<PollDetail> for PollDetailResponse {
    fn from(detail: PollDetail) -> Self {
        Self {
            tally: (&detail.tally).into(),
            poll: detail.poll.into(),
            options: detail.options.into_iter().map(Into::into).collect(),
        }
    }
}

/// Create poll request.
///
/// Accepts either the four form slots (`option1`..`option4`) or an
/// `options` array; only the first four entries are used either way.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    #[serde(default)]
    pub title: String,
    pub option1: Option<String>,
    pub option2: Option<String>,
    pub option3: Option<String>,
    pub option4: Option<String>,
    pub options: Option<Vec<String>>,
}

impl CreatePollRequest {
    fn into_input(self) -> CreatePollInput {
        let options = self.options.unwrap_or_else(|| {
            [self.option1, self.option2, self.option3, self.option4]
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect()
        });
        CreatePollInput {
            title: self.title,
            options: options.into_iter().take(CREATE_OPTION_SLOTS).collect(),
        }
    }
}

/// Vote request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_id: Option<String>,
}

/// Vote response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub id: String,
    pub option_id: String,
    pub tally: TallyResponse,
}

/// List polls, newest first.
async fn list_polls(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<PollResponse>>> {
    let polls = state.poll_service.list_polls().await?;
    Ok(ApiResponse::ok(polls.into_iter().map(Into::into).collect()))
}

/// Create a poll.
async fn create_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePollRequest>,
) -> AppResult<ApiResponse<PollWithOptionsResponse>> {
    let created = state
        .poll_service
        .create_poll(Some(&user), req.into_input())
        .await?;
    Ok(ApiResponse::created(created.into()))
}

/// Get a poll with its tally.
async fn show_poll(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<PollDetailResponse>> {
    let detail = state
        .poll_service
        .get_poll_detail(&poll_id, viewer.as_ref())
        .await?;
    Ok(ApiResponse::ok(detail.into()))
}

/// Edit a poll.
///
/// Browsers that try to edit someone else's poll are sent back to the list.
async fn update_poll(
    AuthUser(user): AuthUser,
    AcceptsHtml(html): AcceptsHtml,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<UpdatePollInput>,
) -> Response {
    match state.poll_service.update_poll(Some(&user), &poll_id, req).await {
        Ok(updated) => ApiResponse::ok(PollWithOptionsResponse::from(updated)).into_response(),
        Err(AppError::Forbidden(_)) if html => {
            Redirect::to(&state.auth.poll_list_path).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Delete a poll.
async fn delete_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.poll_service.delete_poll(Some(&user), &poll_id).await?;
    Ok(response::ok())
}

/// Vote on a poll.
async fn vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<VoteResponse>> {
    let mut tally = state
        .poll_service
        .load_tally(&poll_id, req.option_id.as_deref())
        .await?;

    let vote::Model { id, option_id, .. } = state
        .vote_service
        .submit(Some(&user), &poll_id, req.option_id.as_deref(), &mut tally)
        .await?;

    Ok(ApiResponse::created(VoteResponse {
        id,
        option_id,
        tally: (&tally).into(),
    }))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let guard = middleware::from_fn_with_state(state.clone(), require_auth);

    Router::new()
        .route(
            "/",
            get(list_polls)
                .post(create_poll)
                .route_layer(guard.clone()),
        )
        .route(
            "/{id}",
            get(show_poll).merge(
                put(update_poll)
                    .delete(delete_poll)
                    .route_layer(guard.clone()),
            ),
        )
        .route("/{id}/vote", post(vote).route_layer(guard.clone()))
        .route("/{id}/stream", get(sse::poll_stream).route_layer(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_uses_form_slots() {
        let req: CreatePollRequest = serde_json::from_str(
            r#"{"title":"Lunch?","option1":"Pizza","option3":"Sushi"}"#,
        )
        .unwrap_or_default();

        let input = req.into_input();
        assert_eq!(input.title, "Lunch?");
        assert_eq!(input.options, ["Pizza", "", "Sushi", ""]);
    }

    #[test]
    fn test_create_request_array_is_capped() {
        let req: CreatePollRequest =
            serde_json::from_str(r#"{"title":"Q","options":["a","b","c","d","e"]}"#)
                .unwrap_or_default();

        assert_eq!(req.into_input().options.len(), CREATE_OPTION_SLOTS);
    }
}
