pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marginalia_core::Scheduler;

use crate::db::Database;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub scheduler: Arc<Scheduler>,
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Connect to database
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    let state = AppState {
        db: Arc::new(db),
        scheduler: Arc::new(Scheduler::default()),
    };

    // Build router with protected routes
    let protected_routes = Router::new()
        // User routes
        .route("/api/users/me", get(routes::users::me))
        // Sync routes
        .route("/api/sync/pull", post(routes::sync::pull))
        .route("/api/sync/push", post(routes::sync::push))
        // Import route
        .route("/api/import", post(routes::import::import))
        // Review routes
        .route("/api/review/flashcard", post(routes::review::flashcard))
        .route("/api/review/highlight", post(routes::review::highlight))
        // Study route
        .route("/api/study/queue", get(routes::study::queue))
        // Book routes
        .route("/api/books", get(routes::books::list))
        .route("/api/books", post(routes::books::create))
        .route("/api/books/{id}", delete(routes::books::remove))
        .route("/api/books/{id}/highlights", get(routes::books::highlights))
        .route("/api/books/{id}/tags/{tag_id}", post(routes::books::add_tag))
        .route("/api/books/{id}/tags/{tag_id}", delete(routes::books::remove_tag))
        // Highlight routes
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
        // Deck routes
        .route("/api/decks", get(routes::decks::list))
        .route("/api/decks", post(routes::decks::create))
        .route("/api/decks/{id}", delete(routes::decks::remove))
        .route("/api/decks/{id}/flashcards", post(routes::decks::create_flashcard))
        .route("/api/flashcards/{id}", delete(routes::decks::remove_flashcard))
        // Tag routes
        .route("/api/tags", get(routes::tags::list))
        .route("/api/tags", post(routes::tags::create))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::auth_middleware,
        ));

    // Build full router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/users/register", post(routes::users::register))
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
