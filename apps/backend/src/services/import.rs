//! Device import pipeline: dedup, fill, resurrect.
//!
//! A device upload names a book and carries a batch of raw highlights with
//! no ids. Each row is resolved against what the book already holds, keyed
//! by content fingerprint, so re-importing the same file is a no-op.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use marginalia_core::{fingerprint, resolve_import, ExistingEntry, ImportAction, IncomingHighlight};

use crate::db::Database;
use crate::error::Result;
use crate::models::{Highlight, ImportRequest, ImportResponse};
use crate::services::sync::clip_content;

/// Run a device import: find or create the book, then walk the batch
/// resolving each row against the book's existing highlights. Counts in the
/// response: `created` new rows, `updated` fills of absent page/chapter,
/// `resurrected` cleared tombstones, `skipped` everything already known.
pub async fn run_import(db: &Database, user_id: Uuid, request: &ImportRequest) -> Result<ImportResponse> {
    let book = match db
        .find_book_by_title(user_id, &request.book.title, request.book.author.as_deref())
        .await?
    {
        Some(book) => book,
        None => {
            db.create_book(
                user_id,
                &request.book.title,
                request.book.author.as_deref(),
                request.book.source.as_deref(),
                request.book.cover_image_url.as_deref(),
            )
            .await?
        }
    };

    let rows = db.get_highlights_by_book_with_deleted(book.id, user_id).await?;
    let mut index = index_existing(rows);

    let mut created = 0;
    let mut updated = 0;
    let mut skipped = 0;
    let mut resurrected = 0;

    for item in &request.highlights {
        let (content, original_content) = clip_content(&item.content, None);
        let hash = fingerprint(&content);
        let highlighted_at = item.highlighted_at.and_then(DateTime::from_timestamp_millis);

        let incoming = IncomingHighlight {
            content: content.clone(),
            page: item.page,
            chapter: item.chapter.clone(),
            highlighted_at,
        };

        match resolve_import(&incoming, index.get(&hash)) {
            ImportAction::Create => {
                let highlight = db
                    .create_highlight(
                        user_id,
                        book.id,
                        &content,
                        original_content.as_deref(),
                        &hash,
                        item.page,
                        item.chapter.as_deref(),
                        highlighted_at,
                    )
                    .await?;
                // Index the new row so a duplicate later in the batch skips.
                index.insert(
                    hash,
                    ExistingEntry {
                        id: highlight.id,
                        deleted_at: None,
                        page: highlight.page,
                        chapter: highlight.chapter,
                    },
                );
                created += 1;
            }
            ImportAction::FillMissing { page, chapter } => {
                if let Some(entry) = index.get_mut(&hash) {
                    db.fill_highlight_fields(entry.id, page, chapter.as_deref())
                        .await?;
                    if entry.page.is_none() {
                        entry.page = page;
                    }
                    if entry.chapter.is_none() {
                        entry.chapter = chapter;
                    }
                    updated += 1;
                }
            }
            ImportAction::Resurrect => {
                if let Some(entry) = index.get_mut(&hash) {
                    db.resurrect_highlight(entry.id, item.page, item.chapter.as_deref(), highlighted_at)
                        .await?;
                    entry.deleted_at = None;
                    if item.page.is_some() {
                        entry.page = item.page;
                    }
                    if item.chapter.is_some() {
                        entry.chapter = item.chapter.clone();
                    }
                    resurrected += 1;
                }
            }
            ImportAction::Skip => {
                skipped += 1;
            }
        }
    }

    tracing::info!(
        book_id = %book.id,
        created,
        updated,
        skipped,
        resurrected,
        "import finished"
    );

    Ok(ImportResponse {
        book_id: book.id,
        created,
        updated,
        skipped,
        resurrected,
    })
}

/// Index a book's rows by fingerprint. A live row wins over any tombstoned
/// one; between tombstones the freshest deletion gates resurrection.
fn index_existing(rows: Vec<Highlight>) -> HashMap<String, ExistingEntry> {
    let mut index: HashMap<String, ExistingEntry> = HashMap::new();
    for row in rows {
        let entry = ExistingEntry {
            id: row.id,
            deleted_at: row.deleted_at,
            page: row.page,
            chapter: row.chapter,
        };
        let replace = match index.get(&row.content_hash) {
            None => true,
            Some(current) => match (current.deleted_at, entry.deleted_at) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(old), Some(new)) => new > old,
            },
        };
        if replace {
            index.insert(row.content_hash, entry);
        }
    }
    index
}
