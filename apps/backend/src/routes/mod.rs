//! HTTP route handlers

pub mod auth;
pub mod books;
pub mod decks;
pub mod highlights;
pub mod import;
pub mod review;
pub mod study;
pub mod sync;
pub mod tags;
pub mod users;
