//! Core types shared by the review scheduler and the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Recall rating submitted after reviewing an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    /// Convert to the 1-4 ordinal used on the wire and in weight lookups.
    pub fn to_value(self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// Create from a 1-4 ordinal.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Again),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            4 => Some(Self::Easy),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = CoreError;

    /// Out-of-range ordinals are rejected, never clamped.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or(CoreError::InvalidRating(value))
    }
}

/// Learning state of a reviewable item.
///
/// A never-reviewed item has no [`MemoryState`] at all (`None` in storage);
/// `New` exists so persisted blobs from clients that materialize it still
/// round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    New,
    Learning,
    Review,
    Relearning,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
        }
    }
}

/// Per-item memory estimate, embedded as a JSON blob on highlights
/// (`fsrs_card`) and flashcards (`fsrs_data`).
///
/// Mutated only by [`crate::scheduler::Scheduler::next_state`]; the blob
/// travels between storage and the wire unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    pub stability: f64,
    pub difficulty: f64,
    pub state: ReviewState,
    pub due: DateTime<Utc>,
    pub last_review: DateTime<Utc>,
}

/// Unit for restating a scheduling interval in human terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Minutes,
    Days,
    Months,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minutes => "minutes",
            Self::Days => "days",
            Self::Months => "months",
        }
    }
}

/// A scheduling interval restated in the largest unit that keeps the
/// value at 1 or above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanInterval {
    pub value: i64,
    pub unit: IntervalUnit,
}

impl HumanInterval {
    /// Restate a fractional day count. Below one day the interval reads in
    /// minutes, below thirty days in whole days, beyond that in 30-day
    /// months.
    pub fn from_days(days: f64) -> Self {
        if days < 1.0 {
            Self {
                value: (days * 1440.0).round().max(1.0) as i64,
                unit: IntervalUnit::Minutes,
            }
        } else if days < 30.0 {
            Self {
                value: days.round() as i64,
                unit: IntervalUnit::Days,
            }
        } else {
            Self {
                value: (days / 30.0).round().max(1.0) as i64,
                unit: IntervalUnit::Months,
            }
        }
    }
}

impl std::fmt::Display for HumanInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = match (self.unit, self.value) {
            (IntervalUnit::Minutes, 1) => "minute",
            (IntervalUnit::Minutes, _) => "minutes",
            (IntervalUnit::Days, 1) => "day",
            (IntervalUnit::Days, _) => "days",
            (IntervalUnit::Months, 1) => "month",
            (IntervalUnit::Months, _) => "months",
        };
        write!(f, "{} {}", self.value, unit)
    }
}
