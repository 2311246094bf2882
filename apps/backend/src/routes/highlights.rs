//! Highlight endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use marginalia_core::fingerprint;

use crate::error::{ApiError, Result};
use crate::models::{CreateHighlightRequest, DeleteResponse, Highlight, HighlightTag};
use crate::routes::auth::AuthenticatedUser;
use crate::services::sync::clip_content;
use crate::AppState;

/// POST /api/highlights
/// Create a highlight by hand
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateHighlightRequest>,
) -> Result<Json<Highlight>> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::Validation("highlight content must not be empty".to_string()));
    }

    let book = state
        .db
        .get_book(payload.book_id, auth.user_id)
        .await?
        .filter(|b| b.deleted_at.is_none())
        .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?;

    let (content, original_content) = clip_content(&payload.content, None);
    let content_hash = fingerprint(&content);

    let highlight = state
        .db
        .create_highlight(
            auth.user_id,
            book.id,
            &content,
            original_content.as_deref(),
            &content_hash,
            payload.page,
            payload.chapter.as_deref(),
            payload.highlighted_at,
        )
        .await?;

    Ok(Json(highlight))
}

/// DELETE /api/highlights/{id}
/// Tombstone a highlight
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(highlight_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.db.delete_highlight(highlight_id, auth.user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Highlight not found".to_string()));
    }

    Ok(Json(DeleteResponse { deleted: true }))
}

/// DELETE /api/highlights/{id}/permanent
/// Remove a highlight outright, bypassing the tombstone
pub async fn remove_permanent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(highlight_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state
        .db
        .delete_highlight_permanent(highlight_id, auth.user_id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Highlight not found".to_string()));
    }

    Ok(Json(DeleteResponse { deleted: true }))
}

/// POST /api/highlights/{id}/tags/{tag_id}
/// Attach a tag to a highlight
pub async fn add_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((highlight_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<HighlightTag>> {
    state
        .db
        .get_highlight(highlight_id, auth.user_id)
        .await?
        .filter(|h| h.deleted_at.is_none())
        .ok_or_else(|| ApiError::NotFound("Highlight not found".to_string()))?;

    state
        .db
        .get_tag(tag_id, auth.user_id)
        .await?
        .filter(|t| t.deleted_at.is_none())
        .ok_or_else(|| ApiError::NotFound("Tag not found".to_string()))?;

    let link = state
        .db
        .add_highlight_tag(auth.user_id, highlight_id, tag_id)
        .await?;
    Ok(Json(link))
}

/// DELETE /api/highlights/{id}/tags/{tag_id}
/// Detach a tag from a highlight
pub async fn remove_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((highlight_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeleteResponse>> {
    let removed = state
        .db
        .remove_highlight_tag(auth.user_id, highlight_id, tag_id)
        .await?;
    if !removed {
        return Err(ApiError::NotFound("Tag link not found".to_string()));
    }

    Ok(Json(DeleteResponse { deleted: true }))
}
