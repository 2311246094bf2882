//! Test fixtures and factory functions for creating test data.

use serde_json::json;
use uuid::Uuid;

/// Create a user register request body.
pub fn register_request(name: Option<&str>) -> serde_json::Value {
    match name {
        Some(n) => json!({ "name": n }),
        None => json!({}),
    }
}

/// Create a sync pull request body.
pub fn sync_pull_request(last_pulled_at: Option<i64>) -> serde_json::Value {
    json!({ "last_pulled_at": last_pulled_at })
}

/// Create a sync push request body around a changes object.
pub fn sync_push_request(changes: serde_json::Value) -> serde_json::Value {
    json!({ "last_pulled_at": null, "changes": changes })
}

/// Create a wire book row for push payloads.
pub fn wire_book(id: Uuid, title: &str) -> serde_json::Value {
    json!({ "id": id, "title": title, "author": "Test Author" })
}

/// Create a wire highlight row for push payloads.
pub fn wire_highlight(id: Uuid, book_id: Uuid, content: &str) -> serde_json::Value {
    json!({ "id": id, "book_id": book_id, "content": content })
}

/// Create a wire tag row for push payloads.
pub fn wire_tag(id: Uuid, name: &str) -> serde_json::Value {
    json!({ "id": id, "name": name })
}

/// Create a wire manual deck row for push payloads.
pub fn wire_deck(id: Uuid, name: &str) -> serde_json::Value {
    json!({ "id": id, "name": name, "kind": "manual" })
}

/// Create a wire flashcard row for push payloads.
pub fn wire_flashcard(id: Uuid, deck_id: Uuid, front: &str) -> serde_json::Value {
    json!({ "id": id, "deck_id": deck_id, "front": front })
}

/// Create an import request body for one book.
pub fn import_request(title: &str, highlights: Vec<serde_json::Value>) -> serde_json::Value {
    json!({ "book": { "title": title }, "highlights": highlights })
}

/// Create a bare import highlight.
pub fn import_highlight(content: &str) -> serde_json::Value {
    json!({ "content": content })
}

/// Create an import highlight with location fields.
pub fn import_highlight_with_page(content: &str, page: i32, chapter: &str) -> serde_json::Value {
    json!({ "content": content, "page": page, "chapter": chapter })
}

/// Create an import highlight with a device timestamp (epoch millis).
pub fn import_highlight_timestamped(content: &str, highlighted_at: i64) -> serde_json::Value {
    json!({ "content": content, "highlighted_at": highlighted_at })
}

/// Create a flashcard review request body.
pub fn review_flashcard_request(flashcard_id: &str, rating: i64) -> serde_json::Value {
    json!({ "flashcard_id": flashcard_id, "rating": rating })
}

/// Create a highlight review request body.
pub fn review_highlight_request(highlight_id: &str, rating: i64) -> serde_json::Value {
    json!({ "highlight_id": highlight_id, "rating": rating })
}

/// Create a book create request body.
pub fn create_book_request(title: &str) -> serde_json::Value {
    json!({ "title": title, "author": "Test Author" })
}

/// Create a deck create request body.
pub fn create_deck_request(name: &str, kind: &str) -> serde_json::Value {
    json!({ "name": name, "kind": kind })
}

/// Create a smart deck create request body.
pub fn create_smart_deck_request(name: &str, tag_id: &str) -> serde_json::Value {
    json!({ "name": name, "kind": "smart", "smart_tag_id": tag_id })
}

/// Create a flashcard create request body.
pub fn create_flashcard_request(front: &str, back: Option<&str>) -> serde_json::Value {
    json!({ "front": front, "back": back })
}

/// Generate a unique book title to avoid collisions between test runs.
pub fn unique_title(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().to_string()[..8])
}
