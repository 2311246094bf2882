//! Watermark sync: pull windows and push apply.
//!
//! Pull partitions every syncable table into created/updated/deleted
//! relative to the client's watermark and hands back a fresh server clock.
//! Push applies a client batch in one transaction, walking tables in FK
//! dependency order and re-stamping every clock server-side.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use marginalia_core::fingerprint;

use crate::db::Database;
use crate::error::{ApiError, Result};
use crate::models::{
    SyncChanges, SyncPullRequest, SyncPullResponse, SyncPushRequest, SyncPushResponse,
    TableChanges, WireBook, WireBookTag, WireDeck, WireFlashcard, WireHighlight, WireHighlightTag,
    WireTag,
};

/// Longest highlight content stored verbatim. Longer text is clipped and the
/// full version kept in `original_content`.
const MAX_CONTENT_LEN: usize = 8191;

/// Decode a client watermark. A millisecond value no timestamp can hold is a
/// client bug worth rejecting loudly.
pub fn parse_watermark(last_pulled_at: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    match last_pulled_at {
        None => Ok(None),
        Some(ms) => DateTime::from_timestamp_millis(ms)
            .map(Some)
            .ok_or_else(|| ApiError::Validation(format!("last_pulled_at out of range: {ms}"))),
    }
}

/// Decode an optional row-level clock. Unlike the watermark these are
/// advisory, so unrepresentable values degrade to NULL.
fn millis_to_datetime(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

/// Clip oversized content. The fingerprint only reads the first 100
/// characters, so clipping never changes a row's identity.
pub fn clip_content(content: &str, original: Option<&str>) -> (String, Option<String>) {
    if content.chars().count() <= MAX_CONTENT_LEN {
        return (content.to_string(), original.map(str::to_string));
    }
    let clipped: String = content.chars().take(MAX_CONTENT_LEN).collect();
    let original = original.unwrap_or(content).to_string();
    (clipped, Some(original))
}

/// Derive the denormalized due column from a memory-state blob. Malformed
/// blobs mean no due date and the card surfaces as new.
pub fn due_from_blob(blob: Option<&Value>) -> Option<DateTime<Utc>> {
    let due = blob?.get("due")?.as_str()?;
    due.parse::<DateTime<Utc>>().ok()
}

/// Assemble the full pull response: every table's change windows plus the
/// server clock the client stores as its next watermark.
pub async fn pull(db: &Database, user_id: Uuid, request: &SyncPullRequest) -> Result<SyncPullResponse> {
    let since = parse_watermark(request.last_pulled_at)?;

    // Clock first: writes racing this pull land after it and surface next time.
    let timestamp = Utc::now().timestamp_millis();

    let changes = SyncChanges {
        books: db.pull_books(user_id, since).await?.map(WireBook::from),
        tags: db.pull_tags(user_id, since).await?.map(WireTag::from),
        decks: db.pull_decks(user_id, since).await?.map(WireDeck::from),
        highlights: db
            .pull_highlights(user_id, since)
            .await?
            .map(WireHighlight::from),
        flashcards: db
            .pull_flashcards(user_id, since)
            .await?
            .map(WireFlashcard::from),
        book_tags: db
            .pull_book_tags(user_id, since)
            .await?
            .map(WireBookTag::from),
        highlight_tags: db
            .pull_highlight_tags(user_id, since)
            .await?
            .map(WireHighlightTag::from),
    };

    Ok(SyncPullResponse { changes, timestamp })
}

/// Apply a push batch atomically. Tables go in FK dependency order, and
/// within each table creates run before updates before deletes. Every write
/// is scoped to the caller, so foreign ids cross tenants silently apply to
/// nothing. Returns how many rows actually changed.
pub async fn push(db: &Database, user_id: Uuid, request: SyncPushRequest) -> Result<SyncPushResponse> {
    // Client clocks are never trusted; one server instant stamps the batch.
    let now = Utc::now();
    let changes = request.changes;

    let mut tx = db.pool().begin().await?;
    let mut applied = 0;

    applied += apply_books(&mut tx, user_id, now, &changes.books).await?;
    applied += apply_tags(&mut tx, user_id, now, &changes.tags).await?;
    applied += apply_decks(&mut tx, user_id, now, &changes.decks).await?;
    applied += apply_highlights(&mut tx, user_id, now, &changes.highlights).await?;
    applied += apply_flashcards(&mut tx, user_id, now, &changes.flashcards).await?;
    applied += apply_book_tags(&mut tx, user_id, now, &changes.book_tags).await?;
    applied += apply_highlight_tags(&mut tx, user_id, now, &changes.highlight_tags).await?;

    tx.commit().await?;

    Ok(SyncPushResponse { applied })
}

async fn insert_book(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    book: &WireBook,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO books (id, user_id, title, author, source, cover_image_url, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(book.id)
    .bind(user_id)
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.source)
    .bind(&book.cover_image_url)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

async fn apply_books(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    changes: &TableChanges<WireBook>,
) -> Result<usize> {
    let mut applied = 0;

    for book in &changes.created {
        applied += insert_book(tx, user_id, now, book).await? as usize;
    }

    for book in &changes.updated {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = $3, author = $4, source = $5, cover_image_url = $6, updated_at = $7
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(book.id)
        .bind(user_id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.source)
        .bind(&book.cover_image_url)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            // Unknown id: the row never reached this server, create it.
            applied += insert_book(tx, user_id, now, book).await? as usize;
        } else {
            applied += result.rows_affected() as usize;
        }
    }

    if !changes.deleted.is_empty() {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET deleted_at = $3, updated_at = $3
            WHERE id = ANY($1) AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(&changes.deleted)
        .bind(user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        applied += result.rows_affected() as usize;
    }

    Ok(applied)
}

async fn insert_tag(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    tag: &WireTag,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO tags (id, user_id, name, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(tag.id)
    .bind(user_id)
    .bind(&tag.name)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

async fn apply_tags(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    changes: &TableChanges<WireTag>,
) -> Result<usize> {
    let mut applied = 0;

    for tag in &changes.created {
        applied += insert_tag(tx, user_id, now, tag).await? as usize;
    }

    for tag in &changes.updated {
        let result = sqlx::query(
            r#"
            UPDATE tags
            SET name = $3, updated_at = $4
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tag.id)
        .bind(user_id)
        .bind(&tag.name)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            applied += insert_tag(tx, user_id, now, tag).await? as usize;
        } else {
            applied += result.rows_affected() as usize;
        }
    }

    if !changes.deleted.is_empty() {
        let result = sqlx::query(
            r#"
            UPDATE tags
            SET deleted_at = $3, updated_at = $3
            WHERE id = ANY($1) AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(&changes.deleted)
        .bind(user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        applied += result.rows_affected() as usize;
    }

    Ok(applied)
}

async fn insert_deck(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    deck: &WireDeck,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO decks (id, user_id, name, kind, smart_tag_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(deck.id)
    .bind(user_id)
    .bind(&deck.name)
    .bind(&deck.kind)
    .bind(deck.smart_tag_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

async fn apply_decks(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    changes: &TableChanges<WireDeck>,
) -> Result<usize> {
    let mut applied = 0;

    for deck in &changes.created {
        applied += insert_deck(tx, user_id, now, deck).await? as usize;
    }

    for deck in &changes.updated {
        let result = sqlx::query(
            r#"
            UPDATE decks
            SET name = $3, kind = $4, smart_tag_id = $5, updated_at = $6
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(deck.id)
        .bind(user_id)
        .bind(&deck.name)
        .bind(&deck.kind)
        .bind(deck.smart_tag_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            applied += insert_deck(tx, user_id, now, deck).await? as usize;
        } else {
            applied += result.rows_affected() as usize;
        }
    }

    if !changes.deleted.is_empty() {
        let result = sqlx::query(
            r#"
            UPDATE decks
            SET deleted_at = $3, updated_at = $3
            WHERE id = ANY($1) AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(&changes.deleted)
        .bind(user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        applied += result.rows_affected() as usize;
    }

    Ok(applied)
}

async fn insert_highlight(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    highlight: &WireHighlight,
) -> Result<u64> {
    let (content, original_content) =
        clip_content(&highlight.content, highlight.original_content.as_deref());
    let content_hash = match highlight.content_hash.as_deref() {
        Some(hash) => hash.to_string(),
        None => fingerprint(&content),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO highlights (id, user_id, book_id, content, original_content, content_hash,
                                page, chapter, highlighted_at, fsrs_card, created_at, updated_at, synced_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, $11)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(highlight.id)
    .bind(user_id)
    .bind(highlight.book_id)
    .bind(&content)
    .bind(&original_content)
    .bind(&content_hash)
    .bind(highlight.page)
    .bind(&highlight.chapter)
    .bind(millis_to_datetime(highlight.highlighted_at))
    .bind(&highlight.fsrs_card)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

async fn apply_highlights(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    changes: &TableChanges<WireHighlight>,
) -> Result<usize> {
    let mut applied = 0;

    for highlight in &changes.created {
        applied += insert_highlight(tx, user_id, now, highlight).await? as usize;
    }

    for highlight in &changes.updated {
        let (content, original_content) =
            clip_content(&highlight.content, highlight.original_content.as_deref());

        // Optional fields fill-preserve: an absent value never clears a
        // stored one. The hash keeps its creation-time value even when the
        // content changes, and tombstones stay put; only import resurrects.
        let result = sqlx::query(
            r#"
            UPDATE highlights
            SET content = $3,
                original_content = COALESCE($4, original_content),
                page = COALESCE($5, page),
                chapter = COALESCE($6, chapter),
                highlighted_at = COALESCE($7, highlighted_at),
                fsrs_card = COALESCE($8, fsrs_card),
                updated_at = $9,
                synced_at = $9
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(highlight.id)
        .bind(user_id)
        .bind(&content)
        .bind(&original_content)
        .bind(highlight.page)
        .bind(&highlight.chapter)
        .bind(millis_to_datetime(highlight.highlighted_at))
        .bind(&highlight.fsrs_card)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            applied += insert_highlight(tx, user_id, now, highlight).await? as usize;
        } else {
            applied += result.rows_affected() as usize;
        }
    }

    if !changes.deleted.is_empty() {
        let result = sqlx::query(
            r#"
            UPDATE highlights
            SET deleted_at = $3, synced_at = $3
            WHERE id = ANY($1) AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(&changes.deleted)
        .bind(user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        applied += result.rows_affected() as usize;
    }

    Ok(applied)
}

async fn insert_flashcard(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    flashcard: &WireFlashcard,
) -> Result<u64> {
    // due_at is always re-derived from the blob, the wire value is advisory.
    let due_at = due_from_blob(flashcard.fsrs_data.as_ref());

    let result = sqlx::query(
        r#"
        INSERT INTO flashcards (id, user_id, deck_id, highlight_id, front, back, fsrs_data,
                                due_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(flashcard.id)
    .bind(user_id)
    .bind(flashcard.deck_id)
    .bind(flashcard.highlight_id)
    .bind(&flashcard.front)
    .bind(&flashcard.back)
    .bind(&flashcard.fsrs_data)
    .bind(due_at)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

async fn apply_flashcards(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    changes: &TableChanges<WireFlashcard>,
) -> Result<usize> {
    let mut applied = 0;

    for flashcard in &changes.created {
        applied += insert_flashcard(tx, user_id, now, flashcard).await? as usize;
    }

    for flashcard in &changes.updated {
        let due_at = due_from_blob(flashcard.fsrs_data.as_ref());

        // due_at tracks whichever blob the row ends up holding: a pushed
        // blob sets it, NULL included; an absent blob keeps the stored pair.
        let result = sqlx::query(
            r#"
            UPDATE flashcards
            SET deck_id = $3,
                highlight_id = COALESCE($4, highlight_id),
                front = $5,
                back = COALESCE($6, back),
                fsrs_data = COALESCE($7, fsrs_data),
                due_at = CASE WHEN $7 IS NULL THEN due_at ELSE $8 END,
                updated_at = $9
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(flashcard.id)
        .bind(user_id)
        .bind(flashcard.deck_id)
        .bind(flashcard.highlight_id)
        .bind(&flashcard.front)
        .bind(&flashcard.back)
        .bind(&flashcard.fsrs_data)
        .bind(due_at)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            applied += insert_flashcard(tx, user_id, now, flashcard).await? as usize;
        } else {
            applied += result.rows_affected() as usize;
        }
    }

    if !changes.deleted.is_empty() {
        let result = sqlx::query(
            r#"
            UPDATE flashcards
            SET deleted_at = $3, updated_at = $3
            WHERE id = ANY($1) AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(&changes.deleted)
        .bind(user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        applied += result.rows_affected() as usize;
    }

    Ok(applied)
}

async fn insert_book_tag(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    link: &WireBookTag,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO book_tags (id, user_id, book_id, tag_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(link.id)
    .bind(user_id)
    .bind(link.book_id)
    .bind(link.tag_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

async fn apply_book_tags(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    changes: &TableChanges<WireBookTag>,
) -> Result<usize> {
    let mut applied = 0;

    for link in &changes.created {
        applied += insert_book_tag(tx, user_id, now, link).await? as usize;
    }

    // Nothing on a link row is editable; an update only refreshes the clock.
    for link in &changes.updated {
        let result = sqlx::query(
            r#"
            UPDATE book_tags
            SET updated_at = $3
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(link.id)
        .bind(user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            applied += insert_book_tag(tx, user_id, now, link).await? as usize;
        } else {
            applied += result.rows_affected() as usize;
        }
    }

    if !changes.deleted.is_empty() {
        let result = sqlx::query(
            r#"
            UPDATE book_tags
            SET deleted_at = $3, updated_at = $3
            WHERE id = ANY($1) AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(&changes.deleted)
        .bind(user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        applied += result.rows_affected() as usize;
    }

    Ok(applied)
}

async fn insert_highlight_tag(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    link: &WireHighlightTag,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO highlight_tags (id, user_id, highlight_id, tag_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(link.id)
    .bind(user_id)
    .bind(link.highlight_id)
    .bind(link.tag_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

async fn apply_highlight_tags(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    now: DateTime<Utc>,
    changes: &TableChanges<WireHighlightTag>,
) -> Result<usize> {
    let mut applied = 0;

    for link in &changes.created {
        applied += insert_highlight_tag(tx, user_id, now, link).await? as usize;
    }

    for link in &changes.updated {
        let result = sqlx::query(
            r#"
            UPDATE highlight_tags
            SET updated_at = $3
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(link.id)
        .bind(user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            applied += insert_highlight_tag(tx, user_id, now, link).await? as usize;
        } else {
            applied += result.rows_affected() as usize;
        }
    }

    if !changes.deleted.is_empty() {
        let result = sqlx::query(
            r#"
            UPDATE highlight_tags
            SET deleted_at = $3, updated_at = $3
            WHERE id = ANY($1) AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(&changes.deleted)
        .bind(user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        applied += result.rows_affected() as usize;
    }

    Ok(applied)
}
