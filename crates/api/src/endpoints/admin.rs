//! Admin endpoints.

use axum::{Router, extract::State, routing::post};
use showcase_common::AppResult;
use showcase_core::ReconcileSummary;

use crate::{extractors::MaybeAuthUser, middleware::AppState, response::ApiResponse};

/// Repair submissions whose thread and report disagree.
async fn reconcile(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ReconcileSummary>> {
    let summary = state
        .submission_service
        .reconcile(viewer.as_ref())
        .await?;
    Ok(ApiResponse::ok(summary))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/reconcile", post(reconcile))
}
