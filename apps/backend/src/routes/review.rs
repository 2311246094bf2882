//! Review endpoints

use axum::{extract::State, Extension, Json};

use crate::error::Result;
use crate::models::{ReviewFlashcardRequest, ReviewHighlightRequest, ReviewResponse};
use crate::routes::auth::AuthenticatedUser;
use crate::services;
use crate::AppState;

/// POST /api/review/flashcard
/// Grade a flashcard
pub async fn flashcard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<ReviewFlashcardRequest>,
) -> Result<Json<ReviewResponse>> {
    let response =
        services::review::review_flashcard(&state.db, &state.scheduler, auth.user_id, &payload)
            .await?;
    Ok(Json(response))
}

/// POST /api/review/highlight
/// Grade a highlight directly
pub async fn highlight(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<ReviewHighlightRequest>,
) -> Result<Json<ReviewResponse>> {
    let response =
        services::review::review_highlight(&state.db, &state.scheduler, auth.user_id, &payload)
            .await?;
    Ok(Json(response))
}
