//! PostgreSQL database operations

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    FromRow, PgPool,
};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::*;

// Column lists for the syncable tables, shared by the generic pull helper.
const BOOK_COLUMNS: &str = "id, user_id, title, author, source, cover_image_url, created_at, updated_at, deleted_at";
const TAG_COLUMNS: &str = "id, user_id, name, created_at, updated_at, deleted_at";
const DECK_COLUMNS: &str = "id, user_id, name, kind, smart_tag_id, created_at, updated_at, deleted_at";
const HIGHLIGHT_COLUMNS: &str = "id, user_id, book_id, content, original_content, content_hash, page, chapter, highlighted_at, fsrs_card, created_at, updated_at, synced_at, deleted_at";
const FLASHCARD_COLUMNS: &str = "id, user_id, deck_id, highlight_id, front, back, fsrs_data, due_at, created_at, updated_at, deleted_at";
const BOOK_TAG_COLUMNS: &str = "id, user_id, book_id, tag_id, created_at, updated_at, deleted_at";
const HIGHLIGHT_TAG_COLUMNS: &str = "id, user_id, highlight_id, tag_id, created_at, updated_at, deleted_at";

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // === User Repository ===

    /// Create a new user with generated token
    pub async fn create_user(&self, name: Option<&str>) -> Result<User> {
        let token = Uuid::new_v4().to_string();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (token, name)
            VALUES ($1, $2)
            RETURNING id, token, name, created_at, last_seen_at
            "#,
        )
        .bind(&token)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Get user by token
    pub async fn get_user_by_token(&self, token: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, token, name, created_at, last_seen_at
            FROM users
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, token, name, created_at, last_seen_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update user last_seen_at timestamp
    pub async fn update_last_seen(&self, user_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_seen_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // === Book Repository ===

    /// Create a new book
    pub async fn create_book(
        &self,
        user_id: Uuid,
        title: &str,
        author: Option<&str>,
        source: Option<&str>,
        cover_image_url: Option<&str>,
    ) -> Result<Book> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (user_id, title, author, source, cover_image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, title, author, source, cover_image_url, created_at, updated_at, deleted_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(author)
        .bind(source)
        .bind(cover_image_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(book)
    }

    /// Get book by ID, scoped to its owner
    pub async fn get_book(&self, book_id: Uuid, user_id: Uuid) -> Result<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, user_id, title, author, source, cover_image_url, created_at, updated_at, deleted_at
            FROM books
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// Get all live books for a user
    pub async fn get_books_by_user(&self, user_id: Uuid) -> Result<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, user_id, title, author, source, cover_image_url, created_at, updated_at, deleted_at
            FROM books
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY title
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Find a live book by title and author (author NULL-safe)
    pub async fn find_book_by_title(
        &self,
        user_id: Uuid,
        title: &str,
        author: Option<&str>,
    ) -> Result<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, user_id, title, author, source, cover_image_url, created_at, updated_at, deleted_at
            FROM books
            WHERE user_id = $1 AND title = $2 AND author IS NOT DISTINCT FROM $3
              AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(author)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// Tombstone a book and everything hanging off it: its live highlights,
    /// their tag links, and its own tag links. Returns false if the book was
    /// not found or already deleted.
    pub async fn delete_book_cascade(&self, book_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE books
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        // Tag links of still-live highlights, before the highlights themselves
        sqlx::query(
            r#"
            UPDATE highlight_tags
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE user_id = $2 AND deleted_at IS NULL
              AND highlight_id IN (
                  SELECT id FROM highlights
                  WHERE book_id = $1 AND user_id = $2 AND deleted_at IS NULL
              )
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE highlights
            SET deleted_at = NOW(), synced_at = NOW()
            WHERE book_id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE book_tags
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE book_id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    // === Highlight Repository ===

    /// Create a new highlight
    pub async fn create_highlight(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        content: &str,
        original_content: Option<&str>,
        content_hash: &str,
        page: Option<i32>,
        chapter: Option<&str>,
        highlighted_at: Option<DateTime<Utc>>,
    ) -> Result<Highlight> {
        let highlight = sqlx::query_as::<_, Highlight>(
            r#"
            INSERT INTO highlights (user_id, book_id, content, original_content, content_hash, page, chapter, highlighted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, book_id, content, original_content, content_hash, page, chapter,
                      highlighted_at, fsrs_card, created_at, updated_at, synced_at, deleted_at
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(content)
        .bind(original_content)
        .bind(content_hash)
        .bind(page)
        .bind(chapter)
        .bind(highlighted_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(highlight)
    }

    /// Get highlight by ID, scoped to its owner
    pub async fn get_highlight(&self, highlight_id: Uuid, user_id: Uuid) -> Result<Option<Highlight>> {
        let highlight = sqlx::query_as::<_, Highlight>(
            r#"
            SELECT id, user_id, book_id, content, original_content, content_hash, page, chapter,
                   highlighted_at, fsrs_card, created_at, updated_at, synced_at, deleted_at
            FROM highlights
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(highlight_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(highlight)
    }

    /// Get all live highlights for a book, in reading order
    pub async fn get_highlights_by_book(&self, book_id: Uuid, user_id: Uuid) -> Result<Vec<Highlight>> {
        let highlights = sqlx::query_as::<_, Highlight>(
            r#"
            SELECT id, user_id, book_id, content, original_content, content_hash, page, chapter,
                   highlighted_at, fsrs_card, created_at, updated_at, synced_at, deleted_at
            FROM highlights
            WHERE book_id = $1 AND user_id = $2 AND deleted_at IS NULL
            ORDER BY page ASC NULLS LAST, created_at ASC
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(highlights)
    }

    /// Get all highlights for a book including tombstones, for dedup indexing
    pub async fn get_highlights_by_book_with_deleted(
        &self,
        book_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Highlight>> {
        let highlights = sqlx::query_as::<_, Highlight>(
            r#"
            SELECT id, user_id, book_id, content, original_content, content_hash, page, chapter,
                   highlighted_at, fsrs_card, created_at, updated_at, synced_at, deleted_at
            FROM highlights
            WHERE book_id = $1 AND user_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(highlights)
    }

    /// Fill absent page/chapter on a live highlight. Present values win over
    /// incoming ones.
    pub async fn fill_highlight_fields(
        &self,
        highlight_id: Uuid,
        page: Option<i32>,
        chapter: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE highlights
            SET page = COALESCE(page, $2),
                chapter = COALESCE(chapter, $3),
                updated_at = NOW(),
                synced_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(highlight_id)
        .bind(page)
        .bind(chapter)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Clear a tombstone after a re-highlight. Incoming values win over the
    /// stored ones here, the re-highlight is the newer observation.
    pub async fn resurrect_highlight(
        &self,
        highlight_id: Uuid,
        page: Option<i32>,
        chapter: Option<&str>,
        highlighted_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE highlights
            SET deleted_at = NULL,
                page = COALESCE($2, page),
                chapter = COALESCE($3, chapter),
                highlighted_at = COALESCE($4, highlighted_at),
                updated_at = NOW(),
                synced_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(highlight_id)
        .bind(page)
        .bind(chapter)
        .bind(highlighted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replace a highlight's memory-state blob after a review
    pub async fn update_highlight_memory(
        &self,
        highlight_id: Uuid,
        user_id: Uuid,
        fsrs_card: &Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE highlights
            SET fsrs_card = $3, synced_at = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(highlight_id)
        .bind(user_id)
        .bind(fsrs_card)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Tombstone a highlight and its tag links. Returns false if the
    /// highlight was not found or already deleted.
    pub async fn delete_highlight(&self, highlight_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE highlights
            SET deleted_at = NOW(), synced_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(highlight_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE highlight_tags
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE highlight_id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(highlight_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Physically remove a highlight. Tag links go with it via FK cascade;
    /// flashcards keep their text and lose the link.
    pub async fn delete_highlight_permanent(&self, highlight_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM highlights
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(highlight_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // === Tag Repository ===

    /// Create a new tag
    pub async fn create_tag(&self, user_id: Uuid, name: &str) -> Result<Tag> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (user_id, name)
            VALUES ($1, $2)
            RETURNING id, user_id, name, created_at, updated_at, deleted_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(tag)
    }

    /// Find a live tag by name
    pub async fn find_tag_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, user_id, name, created_at, updated_at, deleted_at
            FROM tags
            WHERE user_id = $1 AND name = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tag)
    }

    /// Get tag by ID, scoped to its owner
    pub async fn get_tag(&self, tag_id: Uuid, user_id: Uuid) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, user_id, name, created_at, updated_at, deleted_at
            FROM tags
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(tag_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tag)
    }

    /// Get all live tags for a user
    pub async fn get_tags_by_user(&self, user_id: Uuid) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, user_id, name, created_at, updated_at, deleted_at
            FROM tags
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }

    /// Link a tag to a book. Returns the existing live link if there is one;
    /// a tombstoned link is left alone and a fresh row created, so the old
    /// deletion still syncs.
    pub async fn add_book_tag(&self, user_id: Uuid, book_id: Uuid, tag_id: Uuid) -> Result<BookTag> {
        let existing = sqlx::query_as::<_, BookTag>(
            r#"
            SELECT id, user_id, book_id, tag_id, created_at, updated_at, deleted_at
            FROM book_tags
            WHERE user_id = $1 AND book_id = $2 AND tag_id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(link) = existing {
            return Ok(link);
        }

        let link = sqlx::query_as::<_, BookTag>(
            r#"
            INSERT INTO book_tags (user_id, book_id, tag_id)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, book_id, tag_id, created_at, updated_at, deleted_at
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(tag_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(link)
    }

    /// Tombstone a book-tag link. Returns false if no live link existed.
    pub async fn remove_book_tag(&self, user_id: Uuid, book_id: Uuid, tag_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE book_tags
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND book_id = $2 AND tag_id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Link a tag to a highlight. Same tombstone handling as `add_book_tag`.
    pub async fn add_highlight_tag(
        &self,
        user_id: Uuid,
        highlight_id: Uuid,
        tag_id: Uuid,
    ) -> Result<HighlightTag> {
        let existing = sqlx::query_as::<_, HighlightTag>(
            r#"
            SELECT id, user_id, highlight_id, tag_id, created_at, updated_at, deleted_at
            FROM highlight_tags
            WHERE user_id = $1 AND highlight_id = $2 AND tag_id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(highlight_id)
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(link) = existing {
            return Ok(link);
        }

        let link = sqlx::query_as::<_, HighlightTag>(
            r#"
            INSERT INTO highlight_tags (user_id, highlight_id, tag_id)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, highlight_id, tag_id, created_at, updated_at, deleted_at
            "#,
        )
        .bind(user_id)
        .bind(highlight_id)
        .bind(tag_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(link)
    }

    /// Tombstone a highlight-tag link. Returns false if no live link existed.
    pub async fn remove_highlight_tag(
        &self,
        user_id: Uuid,
        highlight_id: Uuid,
        tag_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE highlight_tags
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND highlight_id = $2 AND tag_id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(highlight_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // === Deck Repository ===

    /// Create a new deck
    pub async fn create_deck(
        &self,
        user_id: Uuid,
        name: &str,
        kind: &str,
        smart_tag_id: Option<Uuid>,
    ) -> Result<Deck> {
        let deck = sqlx::query_as::<_, Deck>(
            r#"
            INSERT INTO decks (user_id, name, kind, smart_tag_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, kind, smart_tag_id, created_at, updated_at, deleted_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(kind)
        .bind(smart_tag_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(deck)
    }

    /// Get deck by ID, scoped to its owner
    pub async fn get_deck(&self, deck_id: Uuid, user_id: Uuid) -> Result<Option<Deck>> {
        let deck = sqlx::query_as::<_, Deck>(
            r#"
            SELECT id, user_id, name, kind, smart_tag_id, created_at, updated_at, deleted_at
            FROM decks
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(deck_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(deck)
    }

    /// Get all live decks for a user
    pub async fn get_decks_by_user(&self, user_id: Uuid) -> Result<Vec<Deck>> {
        let decks = sqlx::query_as::<_, Deck>(
            r#"
            SELECT id, user_id, name, kind, smart_tag_id, created_at, updated_at, deleted_at
            FROM decks
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(decks)
    }

    /// Tombstone a deck and its flashcards. Returns false if the deck was
    /// not found or already deleted.
    pub async fn delete_deck_cascade(&self, deck_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE decks
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(deck_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE flashcards
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE deck_id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(deck_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    // === Flashcard Repository ===

    /// Create a new flashcard
    pub async fn create_flashcard(
        &self,
        user_id: Uuid,
        deck_id: Uuid,
        front: &str,
        back: Option<&str>,
        highlight_id: Option<Uuid>,
    ) -> Result<Flashcard> {
        let flashcard = sqlx::query_as::<_, Flashcard>(
            r#"
            INSERT INTO flashcards (user_id, deck_id, front, back, highlight_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, deck_id, highlight_id, front, back, fsrs_data, due_at,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(user_id)
        .bind(deck_id)
        .bind(front)
        .bind(back)
        .bind(highlight_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(flashcard)
    }

    /// Get flashcard by ID, scoped to its owner
    pub async fn get_flashcard(&self, flashcard_id: Uuid, user_id: Uuid) -> Result<Option<Flashcard>> {
        let flashcard = sqlx::query_as::<_, Flashcard>(
            r#"
            SELECT id, user_id, deck_id, highlight_id, front, back, fsrs_data, due_at,
                   created_at, updated_at, deleted_at
            FROM flashcards
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(flashcard_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(flashcard)
    }

    /// Replace a flashcard's memory-state blob and derived due date
    pub async fn update_flashcard_memory(
        &self,
        flashcard_id: Uuid,
        user_id: Uuid,
        fsrs_data: &Value,
        due_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE flashcards
            SET fsrs_data = $3, due_at = $4, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(flashcard_id)
        .bind(user_id)
        .bind(fsrs_data)
        .bind(due_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Tombstone a flashcard. Returns false if no live flashcard existed.
    pub async fn delete_flashcard(&self, flashcard_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE flashcards
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(flashcard_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // === Study Repository ===

    /// Get live flashcards in a deck that are new (no due date yet) or due
    pub async fn get_due_flashcards(
        &self,
        deck_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Flashcard>> {
        let flashcards = sqlx::query_as::<_, Flashcard>(
            r#"
            SELECT id, user_id, deck_id, highlight_id, front, back, fsrs_data, due_at,
                   created_at, updated_at, deleted_at
            FROM flashcards
            WHERE deck_id = $1 AND user_id = $2 AND deleted_at IS NULL
              AND (due_at IS NULL OR due_at <= $3)
            ORDER BY due_at ASC NULLS FIRST
            "#,
        )
        .bind(deck_id)
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(flashcards)
    }

    /// Get live highlights carrying a tag that have no live flashcard.
    /// These back a smart deck's virtual cards; due filtering happens in
    /// the service so malformed blobs can be tolerated.
    pub async fn get_smart_deck_candidates(&self, user_id: Uuid, tag_id: Uuid) -> Result<Vec<Highlight>> {
        let highlights = sqlx::query_as::<_, Highlight>(
            r#"
            SELECT h.id, h.user_id, h.book_id, h.content, h.original_content, h.content_hash,
                   h.page, h.chapter, h.highlighted_at, h.fsrs_card, h.created_at, h.updated_at,
                   h.synced_at, h.deleted_at
            FROM highlights h
            WHERE h.user_id = $1 AND h.deleted_at IS NULL
              AND EXISTS (
                  SELECT 1 FROM highlight_tags ht
                  WHERE ht.highlight_id = h.id AND ht.tag_id = $2 AND ht.deleted_at IS NULL
              )
              AND NOT EXISTS (
                  SELECT 1 FROM flashcards f
                  WHERE f.highlight_id = h.id AND f.deleted_at IS NULL
              )
            ORDER BY h.created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(tag_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(highlights)
    }

    // === Sync Repository ===

    /// Pull one table's change windows relative to the watermark.
    ///
    /// `table`, `columns` and `touched` come from the fixed per-table
    /// wrappers below, never from caller input. Absent watermark means
    /// first pull: every live row lands in `created`.
    async fn pull_table<T>(
        &self,
        table: &str,
        columns: &str,
        touched: &str,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<TableChanges<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let Some(since) = since else {
            let created = sqlx::query_as::<_, T>(&format!(
                "SELECT {columns} FROM {table} \
                 WHERE user_id = $1 AND deleted_at IS NULL \
                 ORDER BY created_at ASC"
            ))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

            return Ok(TableChanges {
                created,
                updated: Vec::new(),
                deleted: Vec::new(),
            });
        };

        let created = sqlx::query_as::<_, T>(&format!(
            "SELECT {columns} FROM {table} \
             WHERE user_id = $1 AND deleted_at IS NULL AND created_at > $2 \
             ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let updated = sqlx::query_as::<_, T>(&format!(
            "SELECT {columns} FROM {table} \
             WHERE user_id = $1 AND deleted_at IS NULL AND created_at <= $2 AND {touched} > $2 \
             ORDER BY {touched} ASC"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        // Tombstoned after the watermark; pre-watermark rows the client never
        // saw still produce a harmless delete id.
        let deleted = sqlx::query_scalar::<_, Uuid>(&format!(
            "SELECT id FROM {table} \
             WHERE user_id = $1 AND deleted_at > $2 \
             ORDER BY deleted_at ASC"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(TableChanges {
            created,
            updated,
            deleted,
        })
    }

    /// Pull book changes since the watermark
    pub async fn pull_books(&self, user_id: Uuid, since: Option<DateTime<Utc>>) -> Result<TableChanges<Book>> {
        self.pull_table("books", BOOK_COLUMNS, "updated_at", user_id, since)
            .await
    }

    /// Pull tag changes since the watermark
    pub async fn pull_tags(&self, user_id: Uuid, since: Option<DateTime<Utc>>) -> Result<TableChanges<Tag>> {
        self.pull_table("tags", TAG_COLUMNS, "updated_at", user_id, since)
            .await
    }

    /// Pull deck changes since the watermark
    pub async fn pull_decks(&self, user_id: Uuid, since: Option<DateTime<Utc>>) -> Result<TableChanges<Deck>> {
        self.pull_table("decks", DECK_COLUMNS, "updated_at", user_id, since)
            .await
    }

    /// Pull highlight changes since the watermark. Highlights are touched
    /// through `synced_at`, not `updated_at`.
    pub async fn pull_highlights(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<TableChanges<Highlight>> {
        self.pull_table("highlights", HIGHLIGHT_COLUMNS, "synced_at", user_id, since)
            .await
    }

    /// Pull flashcard changes since the watermark
    pub async fn pull_flashcards(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<TableChanges<Flashcard>> {
        self.pull_table("flashcards", FLASHCARD_COLUMNS, "updated_at", user_id, since)
            .await
    }

    /// Pull book-tag link changes since the watermark
    pub async fn pull_book_tags(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<TableChanges<BookTag>> {
        self.pull_table("book_tags", BOOK_TAG_COLUMNS, "updated_at", user_id, since)
            .await
    }

    /// Pull highlight-tag link changes since the watermark
    pub async fn pull_highlight_tags(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<TableChanges<HighlightTag>> {
        self.pull_table("highlight_tags", HIGHLIGHT_TAG_COLUMNS, "updated_at", user_id, since)
            .await
    }
}
