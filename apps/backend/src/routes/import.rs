//! Device import endpoint

use axum::{extract::State, Extension, Json};

use crate::error::{ApiError, Result};
use crate::models::{ImportRequest, ImportResponse};
use crate::routes::auth::AuthenticatedUser;
use crate::services;
use crate::AppState;

/// POST /api/import
/// Import a device's highlight batch for one book
pub async fn import(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(payload): Json<ImportRequest>,
) -> Result<Json<ImportResponse>> {
    if payload.book.title.trim().is_empty() {
        return Err(ApiError::Validation("book title must not be empty".to_string()));
    }

    let response = services::import::run_import(&state.db, auth.user_id, &payload).await?;
    Ok(Json(response))
}
