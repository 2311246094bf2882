//! Database models and API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

// Re-export shared types from marginalia-core
pub use marginalia_core::{HumanInterval, MemoryState, Rating, ReviewState};

// === Database Entity Types ===

/// Ownership principal. All of a user's devices share one token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub token: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Book stored in PostgreSQL
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub source: Option<String>,
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Highlight stored in PostgreSQL.
///
/// `synced_at` is the sync-relevant last-touched column; `updated_at` only
/// tracks content edits. `fsrs_card` is the opaque memory-state blob.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Highlight {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub content: String,
    pub original_content: Option<String>,
    pub content_hash: String,
    pub page: Option<i32>,
    pub chapter: Option<String>,
    pub highlighted_at: Option<DateTime<Utc>>,
    pub fsrs_card: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Tag stored in PostgreSQL
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Deck stored in PostgreSQL. `kind` is "manual" or "smart"; smart decks
/// carry the tag that feeds their virtual cards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Deck {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub kind: String,
    pub smart_tag_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Flashcard stored in PostgreSQL. `due_at` is a denormalized copy of the
/// blob's due date, re-derived server-side on every write.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Flashcard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub deck_id: Uuid,
    pub highlight_id: Option<Uuid>,
    pub front: String,
    pub back: Option<String>,
    pub fsrs_data: Option<Value>,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Book-tag junction row (full syncable row, not a bare pair)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookTag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub tag_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Highlight-tag junction row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HighlightTag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub highlight_id: Uuid,
    pub tag_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// === Wire Records (sync payloads) ===
//
// Storage rows are remapped before leaving the server: timestamps become
// integer epoch milliseconds and user_id is dropped (the server forces the
// caller's identity on intake). The same records serve pull emission and
// push intake; client-sent clock fields are ignored on apply, so they
// default to zero when a client omits them.

/// Book as carried in sync payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireBook {
    pub id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub source: Option<String>,
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<Book> for WireBook {
    fn from(row: Book) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: row.author,
            source: row.source,
            cover_image_url: row.cover_image_url,
            created_at: row.created_at.timestamp_millis(),
            updated_at: row.updated_at.timestamp_millis(),
            deleted_at: row.deleted_at.map(|t| t.timestamp_millis()),
        }
    }
}

/// Highlight as carried in sync payloads. The memory-state blob passes
/// through as an opaque JSON object; `content_hash` may be omitted on push
/// and is then computed server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireHighlight {
    pub id: Uuid,
    pub book_id: Uuid,
    pub content: String,
    pub original_content: Option<String>,
    pub content_hash: Option<String>,
    pub page: Option<i32>,
    pub chapter: Option<String>,
    pub highlighted_at: Option<i64>,
    pub fsrs_card: Option<Value>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub synced_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<Highlight> for WireHighlight {
    fn from(row: Highlight) -> Self {
        Self {
            id: row.id,
            book_id: row.book_id,
            content: row.content,
            original_content: row.original_content,
            content_hash: Some(row.content_hash),
            page: row.page,
            chapter: row.chapter,
            highlighted_at: row.highlighted_at.map(|t| t.timestamp_millis()),
            fsrs_card: row.fsrs_card,
            created_at: row.created_at.timestamp_millis(),
            updated_at: row.updated_at.timestamp_millis(),
            synced_at: row.synced_at.timestamp_millis(),
            deleted_at: row.deleted_at.map(|t| t.timestamp_millis()),
        }
    }
}

/// Tag as carried in sync payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTag {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<Tag> for WireTag {
    fn from(row: Tag) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at.timestamp_millis(),
            updated_at: row.updated_at.timestamp_millis(),
            deleted_at: row.deleted_at.map(|t| t.timestamp_millis()),
        }
    }
}

/// Deck as carried in sync payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDeck {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub smart_tag_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<Deck> for WireDeck {
    fn from(row: Deck) -> Self {
        Self {
            id: row.id,
            name: row.name,
            kind: row.kind,
            smart_tag_id: row.smart_tag_id,
            created_at: row.created_at.timestamp_millis(),
            updated_at: row.updated_at.timestamp_millis(),
            deleted_at: row.deleted_at.map(|t| t.timestamp_millis()),
        }
    }
}

/// Flashcard as carried in sync payloads. `due_at` is advisory on push;
/// the server re-derives it from the blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFlashcard {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub highlight_id: Option<Uuid>,
    pub front: String,
    pub back: Option<String>,
    pub fsrs_data: Option<Value>,
    pub due_at: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<Flashcard> for WireFlashcard {
    fn from(row: Flashcard) -> Self {
        Self {
            id: row.id,
            deck_id: row.deck_id,
            highlight_id: row.highlight_id,
            front: row.front,
            back: row.back,
            fsrs_data: row.fsrs_data,
            due_at: row.due_at.map(|t| t.timestamp_millis()),
            created_at: row.created_at.timestamp_millis(),
            updated_at: row.updated_at.timestamp_millis(),
            deleted_at: row.deleted_at.map(|t| t.timestamp_millis()),
        }
    }
}

/// Book-tag junction as carried in sync payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireBookTag {
    pub id: Uuid,
    pub book_id: Uuid,
    pub tag_id: Uuid,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<BookTag> for WireBookTag {
    fn from(row: BookTag) -> Self {
        Self {
            id: row.id,
            book_id: row.book_id,
            tag_id: row.tag_id,
            created_at: row.created_at.timestamp_millis(),
            updated_at: row.updated_at.timestamp_millis(),
            deleted_at: row.deleted_at.map(|t| t.timestamp_millis()),
        }
    }
}

/// Highlight-tag junction as carried in sync payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireHighlightTag {
    pub id: Uuid,
    pub highlight_id: Uuid,
    pub tag_id: Uuid,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl From<HighlightTag> for WireHighlightTag {
    fn from(row: HighlightTag) -> Self {
        Self {
            id: row.id,
            highlight_id: row.highlight_id,
            tag_id: row.tag_id,
            created_at: row.created_at.timestamp_millis(),
            updated_at: row.updated_at.timestamp_millis(),
            deleted_at: row.deleted_at.map(|t| t.timestamp_millis()),
        }
    }
}

/// Per-table change tri-list used by both sync directions.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub struct TableChanges<T> {
    #[serde(default)]
    pub created: Vec<T>,
    #[serde(default)]
    pub updated: Vec<T>,
    #[serde(default)]
    pub deleted: Vec<Uuid>,
}

impl<T> TableChanges<T> {
    /// Remap the row type, keeping the deleted id-list as-is.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> TableChanges<U> {
        TableChanges {
            created: self.created.into_iter().map(&mut f).collect(),
            updated: self.updated.into_iter().map(&mut f).collect(),
            deleted: self.deleted,
        }
    }
}

impl<T> Default for TableChanges<T> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

/// Change-sets for the seven syncable tables, in FK dependency order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncChanges {
    #[serde(default)]
    pub books: TableChanges<WireBook>,
    #[serde(default)]
    pub tags: TableChanges<WireTag>,
    #[serde(default)]
    pub decks: TableChanges<WireDeck>,
    #[serde(default)]
    pub highlights: TableChanges<WireHighlight>,
    #[serde(default)]
    pub flashcards: TableChanges<WireFlashcard>,
    #[serde(default)]
    pub book_tags: TableChanges<WireBookTag>,
    #[serde(default)]
    pub highlight_tags: TableChanges<WireHighlightTag>,
}

// === API Request/Response Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

// Sync types
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncPullRequest {
    pub last_pulled_at: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncPullResponse {
    pub changes: SyncChanges,
    /// Server clock at the start of the pull, the client's next watermark.
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncPushRequest {
    /// Accepted for wire compatibility; not used for conflict detection.
    pub last_pulled_at: Option<i64>,
    #[serde(default)]
    pub changes: SyncChanges,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncPushResponse {
    pub applied: usize,
}

// Import types
#[derive(Debug, Serialize, Deserialize)]
pub struct ImportRequest {
    pub book: ImportBook,
    #[serde(default)]
    pub highlights: Vec<ImportHighlight>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportBook {
    pub title: String,
    pub author: Option<String>,
    pub source: Option<String>,
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportHighlight {
    pub content: String,
    pub page: Option<i32>,
    pub chapter: Option<String>,
    /// Device-recorded time, epoch milliseconds.
    pub highlighted_at: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResponse {
    pub book_id: Uuid,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub resurrected: usize,
}

// Review types
#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewFlashcardRequest {
    pub flashcard_id: Uuid,
    pub rating: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewHighlightRequest {
    pub highlight_id: Uuid,
    pub rating: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub due_at: i64,
    pub interval: HumanInterval,
    pub state: ReviewState,
}

// Study types
#[derive(Debug, Deserialize)]
pub struct StudyQueueQuery {
    pub deck_id: Uuid,
    pub limit: Option<i64>,
}

/// One entry in the study queue. Real flashcards carry their UUID as `id`;
/// virtual cards use `virtual:<highlight_id>` and exist only in responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyCard {
    pub id: String,
    pub deck_id: Uuid,
    pub highlight_id: Option<Uuid>,
    pub front: String,
    pub back: Option<String>,
    pub memory_state: Option<Value>,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudyQueueResponse {
    pub deck_id: Uuid,
    pub cards: Vec<StudyCard>,
}

// Library CRUD types
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: Option<String>,
    pub source: Option<String>,
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookListResponse {
    pub books: Vec<Book>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateHighlightRequest {
    pub book_id: Uuid,
    pub content: String,
    pub page: Option<i32>,
    pub chapter: Option<String>,
    pub highlighted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HighlightListResponse {
    pub highlights: Vec<Highlight>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDeckRequest {
    pub name: String,
    pub kind: Option<String>,
    pub smart_tag_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeckListResponse {
    pub decks: Vec<Deck>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFlashcardRequest {
    pub front: String,
    pub back: Option<String>,
    pub highlight_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TagListResponse {
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}
