//! Study queue endpoint

use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::error::Result;
use crate::models::{StudyQueueQuery, StudyQueueResponse};
use crate::routes::auth::AuthenticatedUser;
use crate::services;
use crate::AppState;

/// GET /api/study/queue?deck_id=<uuid>&limit=<n>
/// Cards to study now, real and virtual
pub async fn queue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Query(query): Query<StudyQueueQuery>,
) -> Result<Json<StudyQueueResponse>> {
    let response = services::study::build_queue(&state.db, auth.user_id, &query).await?;
    Ok(Json(response))
}
