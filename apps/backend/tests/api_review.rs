//! Review API tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL before running.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Utc;
use uuid::Uuid;

use common::fixtures;
use common::TestContext;

/// Test the first Good review of a flashcard schedules it an hour out.
#[tokio::test]
#[ignore = "requires database"]
async fn test_review_flashcard_first_good() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (user_id, token) = ctx.create_test_user(None).await;

    let response = server
        .post("/api/decks")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::create_deck_request(
            &fixtures::unique_title("review_deck"),
            "manual",
        ))
        .await;
    response.assert_status_ok();
    let deck_id = response.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .post(&format!("/api/decks/{}/flashcards", deck_id))
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::create_flashcard_request(
            "What is entropy?",
            Some("A measure of disorder"),
        ))
        .await;
    response.assert_status_ok();
    let card_id = response.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let before = Utc::now().timestamp_millis();
    let response = server
        .post("/api/review/flashcard")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::review_flashcard_request(&card_id, 3))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "learning");
    assert_eq!(body["interval"]["value"], 60);
    assert_eq!(body["interval"]["unit"], "minutes");
    let due_at = body["due_at"].as_i64().unwrap();
    assert!(due_at > before);
    assert!(due_at <= before + 2 * 3_600_000);

    // Cleanup
    ctx.cleanup_user(user_id).await;
}

/// Test a second review graduates the card into the review state.
#[tokio::test]
#[ignore = "requires database"]
async fn test_review_flashcard_graduates() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (user_id, token) = ctx.create_test_user(None).await;

    let response = server
        .post("/api/decks")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::create_deck_request(
            &fixtures::unique_title("graduate_deck"),
            "manual",
        ))
        .await;
    let deck_id = response.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .post(&format!("/api/decks/{}/flashcards", deck_id))
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::create_flashcard_request("Front", None))
        .await;
    let card_id = response.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    server
        .post("/api/review/flashcard")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::review_flashcard_request(&card_id, 3))
        .await
        .assert_status_ok();

    let response = server
        .post("/api/review/flashcard")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::review_flashcard_request(&card_id, 3))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "review");
    assert_eq!(body["interval"]["unit"], "days");
    assert_eq!(body["interval"]["value"], 2);

    // Cleanup
    ctx.cleanup_user(user_id).await;
}

/// Test out-of-range ratings are rejected without touching the card.
#[tokio::test]
#[ignore = "requires database"]
async fn test_review_rejects_invalid_rating() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (user_id, token) = ctx.create_test_user(None).await;

    let response = server
        .post("/api/decks")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::create_deck_request(
            &fixtures::unique_title("invalid_rating"),
            "manual",
        ))
        .await;
    let deck_id = response.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .post(&format!("/api/decks/{}/flashcards", deck_id))
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::create_flashcard_request("Front", None))
        .await;
    let card_id = response.json::<serde_json::Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    for rating in [0, 5, 9, -1] {
        let response = server
            .post("/api/review/flashcard")
            .add_header(
                axum::http::header::AUTHORIZATION,
                TestContext::auth_header_value(&token),
            )
            .json(&fixtures::review_flashcard_request(&card_id, rating))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "validation_error");
    }

    // The rejected attempts wrote nothing: the card still takes the
    // first-review path
    let response = server
        .post("/api/review/flashcard")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::review_flashcard_request(&card_id, 3))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["state"], "learning");

    // Cleanup
    ctx.cleanup_user(user_id).await;
}

/// Test reviewing a flashcard that does not exist is a 404.
#[tokio::test]
#[ignore = "requires database"]
async fn test_review_missing_flashcard() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (user_id, token) = ctx.create_test_user(None).await;

    let response = server
        .post("/api/review/flashcard")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::review_flashcard_request(
            &Uuid::new_v4().to_string(),
            3,
        ))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "not_found");

    // Cleanup
    ctx.cleanup_user(user_id).await;
}

/// Test reviewing a highlight persists its memory blob for sync.
#[tokio::test]
#[ignore = "requires database"]
async fn test_review_highlight_persists_memory() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (user_id, token) = ctx.create_test_user(None).await;
    let title = fixtures::unique_title("review_highlight");

    let response = server
        .post("/api/import")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::import_request(
            &title,
            vec![fixtures::import_highlight("Knowledge is of no value unless you put it into practice")],
        ))
        .await;
    response.assert_status_ok();
    let book_id = response.json::<serde_json::Value>()["book_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .get(&format!("/api/books/{}/highlights", book_id))
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .await;
    let highlight_id = response.json::<serde_json::Value>()["highlights"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .post("/api/review/highlight")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::review_highlight_request(&highlight_id, 4))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "learning");
    assert_eq!(body["interval"]["value"], 1);
    assert_eq!(body["interval"]["unit"], "days");

    // The blob rides along on the next sync pull
    let response = server
        .post("/api/sync/pull")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&token),
        )
        .json(&fixtures::sync_pull_request(None))
        .await;
    let body: serde_json::Value = response.json();
    let highlights = body["changes"]["highlights"]["created"].as_array().unwrap();
    assert_eq!(highlights.len(), 1);
    assert_eq!(highlights[0]["fsrs_card"]["state"], "learning");
    assert!(highlights[0]["fsrs_card"]["stability"].as_f64().unwrap() > 0.0);

    // Cleanup
    ctx.cleanup_user(user_id).await;
}

/// Test review endpoints reject requests without a token.
#[tokio::test]
#[ignore = "requires database"]
async fn test_review_requires_auth() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/review/flashcard")
        .json(&fixtures::review_flashcard_request(
            &Uuid::new_v4().to_string(),
            3,
        ))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}
