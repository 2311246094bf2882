//! Common test utilities and fixtures for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - TestContext for setting up test environment with database
//! - Helper functions for creating test data
//! - Authentication helpers
//!
//! # Requirements
//! Integration tests require a PostgreSQL database (set DATABASE_URL).

pub mod fixtures;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use uuid::Uuid;

use marginalia_backend::db::Database;
use marginalia_backend::routes;
use marginalia_backend::AppState;
use marginalia_core::Scheduler;

/// Test context containing database connection and test server.
///
/// Use this to set up integration tests with a real database connection.
/// Requires DATABASE_URL environment variable to be set.
pub struct TestContext {
    pub db: Arc<Database>,
    app: Router,
}

impl TestContext {
    /// Create a new test context.
    ///
    /// # Panics
    /// Panics if DATABASE_URL is not set or database connection fails.
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

        let db = Database::connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        db.run_migrations().await.expect("Failed to run migrations");

        let db = Arc::new(db);

        let state = AppState {
            db: db.clone(),
            scheduler: Arc::new(Scheduler::default()),
        };

        let app = build_test_router(state);

        Self { db, app }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Create a test user and return its ID and token.
    pub async fn create_test_user(&self, name: Option<&str>) -> (Uuid, String) {
        let user = self
            .db
            .create_user(name)
            .await
            .expect("Failed to create test user");
        (user.id, user.token)
    }

    /// Format authorization header value.
    pub fn auth_header_value(token: &str) -> String {
        format!("Bearer {}", token)
    }

    /// Clean up test data for a user.
    ///
    /// Call this after tests to remove test data.
    pub async fn cleanup_user(&self, user_id: Uuid) {
        // Delete in order due to foreign keys
        let _ = sqlx::query("DELETE FROM highlight_tags WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM book_tags WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM flashcards WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM highlights WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM decks WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM tags WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM books WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await;
    }
}

/// Build the test router with all routes.
fn build_test_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/users/me", get(routes::users::me))
        .route("/api/sync/pull", post(routes::sync::pull))
        .route("/api/sync/push", post(routes::sync::push))
        .route("/api/import", post(routes::import::import))
        .route("/api/review/flashcard", post(routes::review::flashcard))
        .route("/api/review/highlight", post(routes::review::highlight))
        .route("/api/study/queue", get(routes::study::queue))
        .route("/api/books", get(routes::books::list))
        .route("/api/books", post(routes::books::create))
        .route("/api/books/{id}", delete(routes::books::remove))
        .route("/api/books/{id}/highlights", get(routes::books::highlights))
        .route("/api/books/{id}/tags/{tag_id}", post(routes::books::add_tag))
        .route(
            "/api/books/{id}/tags/{tag_id}",
            delete(routes::books::remove_tag),
        )
        .route("/api/highlights", post(routes::highlights::create))
        .route("/api/highlights/{id}", delete(routes::highlights::remove))
        .route(
            "/api/highlights/{id}/permanent",
            delete(routes::highlights::remove_permanent),
        )
        .route(
            "/api/highlights/{id}/tags/{tag_id}",
            post(routes::highlights::add_tag),
        )
        .route(
            "/api/highlights/{id}/tags/{tag_id}",
            delete(routes::highlights::remove_tag),
        )
        .route("/api/decks", get(routes::decks::list))
        .route("/api/decks", post(routes::decks::create))
        .route("/api/decks/{id}", delete(routes::decks::remove))
        .route(
            "/api/decks/{id}/flashcards",
            post(routes::decks::create_flashcard),
        )
        .route(
            "/api/flashcards/{id}",
            delete(routes::decks::remove_flashcard),
        )
        .route("/api/tags", get(routes::tags::list))
        .route("/api/tags", post(routes::tags::create))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/users/register", post(routes::users::register))
        .merge(protected_routes)
        .with_state(state)
}
