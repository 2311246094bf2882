//! Import deduplication and resurrection decisions.
//!
//! Imports are replayed wholesale by reader apps, so most incoming
//! highlights already exist. The resolver looks at one incoming highlight
//! and the stored row that matched its fingerprint, and decides what the
//! import should do with it. It is a pure function over the two records;
//! the server owns the lookup and the writes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A highlight as delivered by an import payload, after content truncation.
#[derive(Debug, Clone)]
pub struct IncomingHighlight {
    pub content: String,
    pub page: Option<i32>,
    pub chapter: Option<String>,
    /// When the reader device recorded the highlight. Absent for sources
    /// that do not carry timestamps.
    pub highlighted_at: Option<DateTime<Utc>>,
}

/// The stored highlight whose fingerprint matched the incoming one.
#[derive(Debug, Clone)]
pub struct ExistingEntry {
    pub id: Uuid,
    pub deleted_at: Option<DateTime<Utc>>,
    pub page: Option<i32>,
    pub chapter: Option<String>,
}

/// What an import should do with one incoming highlight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportAction {
    /// No stored match: insert a new row.
    Create,
    /// Already present (or deliberately deleted): leave the row alone.
    Skip,
    /// Live match missing location fields the import can provide. Carries
    /// only the fields to write; a populated field is never overwritten.
    FillMissing {
        page: Option<i32>,
        chapter: Option<String>,
    },
    /// Tombstoned match that was demonstrably re-highlighted after the
    /// deletion: clear the tombstone.
    Resurrect,
}

/// Decide the import action for one incoming highlight.
///
/// `existing` is the row matching the incoming content fingerprint within
/// the same user and book, or `None` when nothing matched. A tombstoned
/// match resurrects only when `highlighted_at` is strictly later than the
/// deletion; an absent device timestamp cannot prove the highlight
/// postdates it, so the deletion wins.
pub fn resolve_import(
    incoming: &IncomingHighlight,
    existing: Option<&ExistingEntry>,
) -> ImportAction {
    let Some(existing) = existing else {
        return ImportAction::Create;
    };

    match existing.deleted_at {
        None => {
            let page = match (existing.page, incoming.page) {
                (None, Some(page)) => Some(page),
                _ => None,
            };
            let chapter = match (&existing.chapter, &incoming.chapter) {
                (None, Some(chapter)) => Some(chapter.clone()),
                _ => None,
            };
            if page.is_some() || chapter.is_some() {
                ImportAction::FillMissing { page, chapter }
            } else {
                ImportAction::Skip
            }
        }
        Some(deleted_at) => match incoming.highlighted_at {
            Some(highlighted_at) if highlighted_at > deleted_at => ImportAction::Resurrect,
            _ => ImportAction::Skip,
        },
    }
}
