//! Sync endpoints

use axum::{extract::State, Extension, Json};

use crate::error::Result;
use crate::models::{SyncPullRequest, SyncPullResponse, SyncPushRequest, SyncPushResponse};
use crate::routes::auth::AuthenticatedUser;
use crate::services;
use crate::AppState;

/// POST /api/sync/pull
/// Pull changes since the client's watermark
pub async fn pull(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<SyncPullRequest>,
) -> Result<Json<SyncPullResponse>> {
    let response = services::sync::pull(&state.db, auth.user_id, &payload).await?;
    Ok(Json(response))
}

/// POST /api/sync/push
/// Apply a client change batch
pub async fn push(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<SyncPushRequest>,
) -> Result<Json<SyncPushResponse>> {
    let response = services::sync::push(&state.db, auth.user_id, payload).await?;

    tracing::debug!(user_id = %auth.user_id, applied = response.applied, "push applied");

    Ok(Json(response))
}
