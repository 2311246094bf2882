//! Book endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::{
    Book, BookListResponse, BookTag, CreateBookRequest, DeleteResponse, HighlightListResponse,
};
use crate::routes::auth::AuthenticatedUser;
use crate::AppState;

/// GET /api/books
/// List the caller's live books
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<BookListResponse>> {
    let books = state.db.get_books_by_user(auth.user_id).await?;
    Ok(Json(BookListResponse { books }))
}

/// POST /api/books
/// Create a book
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateBookRequest>,
) -> Result<Json<Book>> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("book title must not be empty".to_string()));
    }

    let book = state
        .db
        .create_book(
            auth.user_id,
            &payload.title,
            payload.author.as_deref(),
            payload.source.as_deref(),
            payload.cover_image_url.as_deref(),
        )
        .await?;

    Ok(Json(book))
}

/// DELETE /api/books/{id}
/// Tombstone a book and cascade to its highlights
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.db.delete_book_cascade(book_id, auth.user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Book not found".to_string()));
    }

    Ok(Json(DeleteResponse { deleted: true }))
}

/// GET /api/books/{id}/highlights
/// List a book's live highlights in reading order
pub async fn highlights(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<HighlightListResponse>> {
    let book = state
        .db
        .get_book(book_id, auth.user_id)
        .await?
        .filter(|b| b.deleted_at.is_none())
        .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?;

    let highlights = state.db.get_highlights_by_book(book.id, auth.user_id).await?;
    Ok(Json(HighlightListResponse { highlights }))
}

/// POST /api/books/{id}/tags/{tag_id}
/// Attach a tag to a book
pub async fn add_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((book_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BookTag>> {
    state
        .db
        .get_book(book_id, auth.user_id)
        .await?
        .filter(|b| b.deleted_at.is_none())
        .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?;

    state
        .db
        .get_tag(tag_id, auth.user_id)
        .await?
        .filter(|t| t.deleted_at.is_none())
        .ok_or_else(|| ApiError::NotFound("Tag not found".to_string()))?;

    let link = state.db.add_book_tag(auth.user_id, book_id, tag_id).await?;
    Ok(Json(link))
}

/// DELETE /api/books/{id}/tags/{tag_id}
/// Detach a tag from a book
pub async fn remove_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((book_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeleteResponse>> {
    let removed = state.db.remove_book_tag(auth.user_id, book_id, tag_id).await?;
    if !removed {
        return Err(ApiError::NotFound("Tag link not found".to_string()));
    }

    Ok(Json(DeleteResponse { deleted: true }))
}
