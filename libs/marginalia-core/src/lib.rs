//! Core reading-highlights library shared by the server and future clients.
//!
//! Provides:
//! - Content fingerprinting for duplicate detection on import
//! - Import deduplication / resurrection decisions
//! - FSRS-style review scheduling
//! - Shared types (MemoryState, Rating, HumanInterval, etc.)

pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod scheduler;
pub mod types;

pub use dedup::{resolve_import, ExistingEntry, ImportAction, IncomingHighlight};
pub use error::CoreError;
pub use fingerprint::fingerprint;
pub use scheduler::Scheduler;
pub use types::{HumanInterval, IntervalUnit, MemoryState, Rating, ReviewState};
