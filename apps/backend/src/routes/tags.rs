//! Tag endpoints

use axum::{extract::State, Extension, Json};

use crate::error::{ApiError, Result};
use crate::models::{CreateTagRequest, Tag, TagListResponse};
use crate::routes::auth::AuthenticatedUser;
use crate::AppState;

/// GET /api/tags
/// List the caller's live tags
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<TagListResponse>> {
    let tags = state.db.get_tags_by_user(auth.user_id).await?;
    Ok(Json(TagListResponse { tags }))
}

/// POST /api/tags
/// Create a tag, returning the existing one when the name is taken
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateTagRequest>,
) -> Result<Json<Tag>> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("tag name must not be empty".to_string()));
    }

    if let Some(existing) = state.db.find_tag_by_name(auth.user_id, name).await? {
        return Ok(Json(existing));
    }

    let tag = state.db.create_tag(auth.user_id, name).await?;
    Ok(Json(tag))
}
