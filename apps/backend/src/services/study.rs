//! Study queue assembly: real flashcards merged with virtual cards.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{ApiError, Result};
use crate::models::{Deck, Flashcard, Highlight, StudyCard, StudyQueueQuery, StudyQueueResponse};
use crate::services::sync::due_from_blob;

const DEFAULT_QUEUE_LIMIT: i64 = 20;
const MAX_QUEUE_LIMIT: i64 = 100;

/// Assemble the study queue for a deck. Manual decks serve their stored
/// flashcards; smart decks also project virtual cards out of tagged
/// highlights that have no flashcard yet.
pub async fn build_queue(
    db: &Database,
    user_id: Uuid,
    query: &StudyQueueQuery,
) -> Result<StudyQueueResponse> {
    let deck = db
        .get_deck(query.deck_id, user_id)
        .await?
        .filter(|d| d.deleted_at.is_none())
        .ok_or_else(|| ApiError::NotFound("Deck not found".to_string()))?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_QUEUE_LIMIT)
        .clamp(1, MAX_QUEUE_LIMIT) as usize;
    let now = Utc::now();

    let mut cards: Vec<StudyCard> = db
        .get_due_flashcards(deck.id, user_id, now)
        .await?
        .into_iter()
        .map(real_card)
        .collect();

    if deck.kind == "smart" {
        if let Some(tag_id) = deck.smart_tag_id {
            for highlight in db.get_smart_deck_candidates(user_id, tag_id).await? {
                if let Some(card) = virtual_card(&deck, highlight, now) {
                    cards.push(card);
                }
            }
        }
    }

    // None sorts before any due date, so new cards lead the queue.
    cards.sort_by_key(|card| card.due_at);
    cards.truncate(limit);

    Ok(StudyQueueResponse {
        deck_id: deck.id,
        cards,
    })
}

fn real_card(flashcard: Flashcard) -> StudyCard {
    StudyCard {
        id: flashcard.id.to_string(),
        deck_id: flashcard.deck_id,
        highlight_id: flashcard.highlight_id,
        front: flashcard.front,
        back: flashcard.back,
        memory_state: flashcard.fsrs_data,
        due_at: flashcard.due_at,
    }
}

/// Project a highlight into an ephemeral card. Returns None when the
/// highlight's own schedule says it is not due yet; a missing or unreadable
/// blob counts as new.
fn virtual_card(deck: &Deck, highlight: Highlight, now: DateTime<Utc>) -> Option<StudyCard> {
    let due_at = due_from_blob(highlight.fsrs_card.as_ref());
    if let Some(due) = due_at {
        if due > now {
            return None;
        }
    }

    Some(StudyCard {
        id: format!("virtual:{}", highlight.id),
        deck_id: deck.id,
        highlight_id: Some(highlight.id),
        front: highlight.content,
        back: None,
        memory_state: highlight.fsrs_card,
        due_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn deck() -> Deck {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Deck {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "philosophy".to_string(),
            kind: "smart".to_string(),
            smart_tag_id: Some(Uuid::new_v4()),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn highlight(fsrs_card: Option<serde_json::Value>) -> Highlight {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Highlight {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            content: "the unexamined life".to_string(),
            original_content: None,
            content_hash: "2p".to_string(),
            page: None,
            chapter: None,
            highlighted_at: None,
            fsrs_card,
            created_at: now,
            updated_at: now,
            synced_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn unreviewed_highlight_projects_as_new_card() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let h = highlight(None);
        let highlight_id = h.id;

        let card = virtual_card(&deck(), h, now).unwrap();
        assert_eq!(card.id, format!("virtual:{highlight_id}"));
        assert_eq!(card.highlight_id, Some(highlight_id));
        assert_eq!(card.due_at, None);
        assert_eq!(card.front, "the unexamined life");
    }

    #[test]
    fn future_due_highlight_is_excluded() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let blob = serde_json::json!({ "due": "2024-07-01T00:00:00Z" });

        assert!(virtual_card(&deck(), highlight(Some(blob)), now).is_none());
    }

    #[test]
    fn past_due_highlight_is_included_with_its_due_date() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let blob = serde_json::json!({ "due": "2024-05-01T00:00:00Z" });

        let card = virtual_card(&deck(), highlight(Some(blob)), now).unwrap();
        assert_eq!(
            card.due_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn unreadable_blob_counts_as_new() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let blob = serde_json::json!({ "due": 42 });

        let card = virtual_card(&deck(), highlight(Some(blob)), now).unwrap();
        assert_eq!(card.due_at, None);
    }
}
