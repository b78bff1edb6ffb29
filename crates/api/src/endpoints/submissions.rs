//! Submission endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use showcase_common::AppResult;
use showcase_core::{CreateSubmissionInput, CreatedSubmission, Submission, VoteResult};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Review request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    #[serde(default)]
    pub report_id: String,
}

/// Upvote count response.
#[derive(Serialize)]
pub struct UpvotesResponse {
    pub upvotes: u64,
}

/// Public gallery of approved submissions.
async fn list_approved(State(state): State<AppState>) -> ApiResponse<Vec<Submission>> {
    ApiResponse::ok(state.submission_service.list_approved().await)
}

/// Submit a project for review.
async fn create(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateSubmissionInput>,
) -> AppResult<ApiResponse<CreatedSubmission>> {
    let created = state
        .submission_service
        .create(viewer.as_ref(), input)
        .await?;
    Ok(ApiResponse::created(created))
}

/// The caller's own submissions.
async fn list_mine(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
) -> ApiResponse<Vec<Submission>> {
    ApiResponse::ok(state.submission_service.list_mine(viewer.as_ref()).await)
}

/// Review queue (admin only; empty for everyone else).
async fn list_pending(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
) -> ApiResponse<Vec<Submission>> {
    ApiResponse::ok(state.submission_service.list_pending(viewer.as_ref()).await)
}

async fn show(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Submission>> {
    let submission = state.submission_service.get(viewer.as_ref(), &id).await?;
    Ok(ApiResponse::ok(submission))
}

async fn approve(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> AppResult<ApiResponse<Submission>> {
    let submission = state
        .submission_service
        .approve(viewer.as_ref(), &id, &req.report_id)
        .await?;
    Ok(ApiResponse::ok(submission))
}

async fn reject(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> AppResult<ApiResponse<Submission>> {
    let submission = state
        .submission_service
        .reject(viewer.as_ref(), &id, &req.report_id)
        .await?;
    Ok(ApiResponse::ok(submission))
}

/// Like a submission, or take the like back.
async fn toggle_upvote(
    AuthUser(viewer): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<VoteResult>> {
    let result = state.voting_service.toggle_upvote(&viewer, &id).await?;
    Ok(ApiResponse::ok(result))
}

async fn upvotes(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UpvotesResponse>> {
    let upvotes = state.voting_service.upvotes(viewer.as_ref(), &id).await?;
    Ok(ApiResponse::ok(UpvotesResponse { upvotes }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_approved).post(create))
        .route("/mine", get(list_mine))
        .route("/pending", get(list_pending))
        .route("/{id}", get(show))
        .route("/{id}/approve", post(approve))
        .route("/{id}/reject", post(reject))
        .route("/{id}/upvote", post(toggle_upvote))
        .route("/{id}/upvotes", get(upvotes))
}
