//! Review application shared by flashcards and highlights.
//!
//! Both review endpoints do the same thing against different rows: decode
//! the stored memory blob, run the scheduler, write the new blob back, and
//! describe the outcome to the caller.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use marginalia_core::{HumanInterval, MemoryState, Rating, Scheduler};

use crate::db::Database;
use crate::error::{ApiError, Result};
use crate::models::{ReviewFlashcardRequest, ReviewHighlightRequest, ReviewResponse};

/// Decode a wire rating. Anything outside 1-4 is a validation error raised
/// before any state is touched.
fn parse_rating(value: i64) -> Result<Rating> {
    let ordinal = u8::try_from(value)
        .map_err(|_| ApiError::Validation(format!("rating out of range: {value} (expected 1-4)")))?;
    Ok(Rating::try_from(ordinal)?)
}

/// Decode a stored memory blob. A blob that no longer parses resets the
/// card to a first review instead of wedging it forever.
fn memory_from_blob(blob: Option<&Value>) -> Option<MemoryState> {
    let blob = blob?;
    match serde_json::from_value::<MemoryState>(blob.clone()) {
        Ok(state) => Some(state),
        Err(err) => {
            tracing::warn!("discarding unreadable memory blob: {err}");
            None
        }
    }
}

fn review_response(next: &MemoryState, now: DateTime<Utc>) -> ReviewResponse {
    let days = (next.due - now).num_seconds() as f64 / 86_400.0;
    ReviewResponse {
        due_at: next.due.timestamp_millis(),
        interval: HumanInterval::from_days(days),
        state: next.state,
    }
}

/// Grade a flashcard and persist its next memory state.
pub async fn review_flashcard(
    db: &Database,
    scheduler: &Scheduler,
    user_id: Uuid,
    request: &ReviewFlashcardRequest,
) -> Result<ReviewResponse> {
    let rating = parse_rating(request.rating)?;
    let flashcard = db
        .get_flashcard(request.flashcard_id, user_id)
        .await?
        .filter(|f| f.deleted_at.is_none())
        .ok_or_else(|| ApiError::NotFound("Flashcard not found".to_string()))?;

    let now = Utc::now();
    let prior = memory_from_blob(flashcard.fsrs_data.as_ref());
    let next = scheduler.next_state(prior.as_ref(), rating, now);

    let blob = serde_json::to_value(&next)
        .map_err(|e| ApiError::Internal(format!("memory state encoding failed: {e}")))?;
    db.update_flashcard_memory(flashcard.id, user_id, &blob, next.due)
        .await?;

    Ok(review_response(&next, now))
}

/// Grade a highlight directly, without a flashcard in between.
pub async fn review_highlight(
    db: &Database,
    scheduler: &Scheduler,
    user_id: Uuid,
    request: &ReviewHighlightRequest,
) -> Result<ReviewResponse> {
    let rating = parse_rating(request.rating)?;
    let highlight = db
        .get_highlight(request.highlight_id, user_id)
        .await?
        .filter(|h| h.deleted_at.is_none())
        .ok_or_else(|| ApiError::NotFound("Highlight not found".to_string()))?;

    let now = Utc::now();
    let prior = memory_from_blob(highlight.fsrs_card.as_ref());
    let next = scheduler.next_state(prior.as_ref(), rating, now);

    let blob = serde_json::to_value(&next)
        .map_err(|e| ApiError::Internal(format!("memory state encoding failed: {e}")))?;
    db.update_highlight_memory(highlight.id, user_id, &blob).await?;

    Ok(review_response(&next, now))
}
