//! Error types for marginalia-core.

use thiserror::Error;

/// Errors from the pure domain logic.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("rating out of range: {0} (expected 1-4)")]
    InvalidRating(u8),
}
