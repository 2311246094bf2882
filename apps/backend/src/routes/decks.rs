//! Deck and flashcard endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::{
    CreateDeckRequest, CreateFlashcardRequest, Deck, DeckListResponse, DeleteResponse, Flashcard,
};
use crate::routes::auth::AuthenticatedUser;
use crate::AppState;

/// GET /api/decks
/// List the caller's live decks
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<DeckListResponse>> {
    let decks = state.db.get_decks_by_user(auth.user_id).await?;
    Ok(Json(DeckListResponse { decks }))
}

/// POST /api/decks
/// Create a manual or smart deck
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateDeckRequest>,
) -> Result<Json<Deck>> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation("deck name must not be empty".to_string()));
    }

    let kind = payload.kind.as_deref().unwrap_or("manual");
    let deck = match kind {
        "manual" => {
            if payload.smart_tag_id.is_some() {
                return Err(ApiError::Validation(
                    "manual decks do not carry a smart_tag_id".to_string(),
                ));
            }
            state
                .db
                .create_deck(auth.user_id, &payload.name, "manual", None)
                .await?
        }
        "smart" => {
            let tag_id = payload.smart_tag_id.ok_or_else(|| {
                ApiError::Validation("smart decks require a smart_tag_id".to_string())
            })?;
            let tag = state
                .db
                .get_tag(tag_id, auth.user_id)
                .await?
                .filter(|t| t.deleted_at.is_none())
                .ok_or_else(|| ApiError::NotFound("Tag not found".to_string()))?;
            state
                .db
                .create_deck(auth.user_id, &payload.name, "smart", Some(tag.id))
                .await?
        }
        other => {
            return Err(ApiError::Validation(format!("unknown deck kind: {other}")));
        }
    };

    Ok(Json(deck))
}

/// DELETE /api/decks/{id}
/// Tombstone a deck and its flashcards
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(deck_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.db.delete_deck_cascade(deck_id, auth.user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Deck not found".to_string()));
    }

    Ok(Json(DeleteResponse { deleted: true }))
}

/// POST /api/decks/{id}/flashcards
/// Create a flashcard in a deck, optionally linked to a highlight
pub async fn create_flashcard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(deck_id): Path<Uuid>,
    Json(payload): Json<CreateFlashcardRequest>,
) -> Result<Json<Flashcard>> {
    if payload.front.trim().is_empty() {
        return Err(ApiError::Validation("flashcard front must not be empty".to_string()));
    }

    let deck = state
        .db
        .get_deck(deck_id, auth.user_id)
        .await?
        .filter(|d| d.deleted_at.is_none())
        .ok_or_else(|| ApiError::NotFound("Deck not found".to_string()))?;

    if let Some(highlight_id) = payload.highlight_id {
        state
            .db
            .get_highlight(highlight_id, auth.user_id)
            .await?
            .filter(|h| h.deleted_at.is_none())
            .ok_or_else(|| ApiError::NotFound("Highlight not found".to_string()))?;
    }

    let flashcard = state
        .db
        .create_flashcard(
            auth.user_id,
            deck.id,
            &payload.front,
            payload.back.as_deref(),
            payload.highlight_id,
        )
        .await?;

    Ok(Json(flashcard))
}

/// DELETE /api/flashcards/{id}
/// Tombstone a flashcard
pub async fn remove_flashcard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(flashcard_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.db.delete_flashcard(flashcard_id, auth.user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Flashcard not found".to_string()));
    }

    Ok(Json(DeleteResponse { deleted: true }))
}
