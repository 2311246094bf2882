//! Spaced-repetition scheduler.
//!
//! A trimmed FSRS-style model: each reviewable item carries a
//! [`MemoryState`] (stability, difficulty, review state, due date) and every
//! review maps the prior state plus a [`Rating`] to the next state. The
//! function is pure so flashcard reviews and highlight re-surfacing share
//! one implementation, and tests can drive it with fixed clocks.

use chrono::{DateTime, Duration, Utc};

use crate::types::{MemoryState, Rating, ReviewState};

/// Difficulty is clamped into this closed range at every step.
const MIN_DIFFICULTY: f64 = 1.0;
const MAX_DIFFICULTY: f64 = 10.0;

/// Stability floor applied at every step.
const MIN_STABILITY: f64 = 0.1;

/// A lapse retains at most this share of the prior stability.
const LAPSE_RETENTION_CAP: f64 = 0.9;

/// Reference retention the interval formula is normalized against.
const INTERVAL_DECAY_BASE: f64 = 0.9;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// FSRS-style scheduler with a fixed parameter table.
///
/// The defaults are the published FSRS-4.5 starting weights; they are not
/// per-user tuned here. `w[0..=3]` seed stability for the four ratings,
/// `w[4..=5]` seed difficulty, `w[6]` shifts difficulty per review and
/// `w[8..=16]` drive the stability update.
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Target recall probability used when deriving intervals.
    pub request_retention: f64,
    /// Ceiling, in days, on stored stability and derived intervals.
    pub maximum_interval: f64,
    /// Model weights.
    pub w: [f64; 17],
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            request_retention: 0.9,
            maximum_interval: 36_500.0,
            w: [
                0.4, 0.6, 2.4, 5.8, 4.93, 0.94, 0.86, 0.01, 1.49, 0.14, 0.94, 2.18, 0.05, 0.34,
                1.26, 0.29, 2.61,
            ],
        }
    }
}

impl Scheduler {
    /// Apply a review at `now` and produce the next memory state.
    ///
    /// `prior` of `None`, or a state still marked [`ReviewState::New`],
    /// takes the first-review path; anything else is a subsequent review.
    pub fn next_state(
        &self,
        prior: Option<&MemoryState>,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> MemoryState {
        match prior {
            Some(state) if state.state != ReviewState::New => {
                self.subsequent_review(state, rating, now)
            }
            _ => self.first_review(rating, now),
        }
    }

    fn first_review(&self, rating: Rating, now: DateTime<Utc>) -> MemoryState {
        let grade = rating.to_value() as f64;
        let stability = self.w[(rating.to_value() - 1) as usize].max(MIN_STABILITY);
        let difficulty =
            (self.w[4] - self.w[5] * (grade - 3.0)).clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);

        MemoryState {
            stability,
            difficulty,
            state: ReviewState::Learning,
            due: now + first_interval(rating),
            last_review: now,
        }
    }

    fn subsequent_review(
        &self,
        prior: &MemoryState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> MemoryState {
        // Tolerate out-of-range values in stored blobs.
        let stability = prior.stability.max(MIN_STABILITY).min(self.maximum_interval);
        let difficulty = prior.difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);

        let elapsed = elapsed_days(prior.last_review, now);
        let retrievability = (-elapsed / stability).exp();

        let grade = rating.to_value() as f64;
        let next_difficulty =
            (difficulty - self.w[6] * (grade - 3.0)).clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);

        let next_stability = if rating == Rating::Again {
            self.stability_after_forget(stability, difficulty, retrievability)
        } else {
            self.stability_after_recall(stability, difficulty, retrievability, rating)
        };

        let interval = self.interval_days(next_stability, rating);

        MemoryState {
            stability: next_stability,
            difficulty: next_difficulty,
            state: ReviewState::Review,
            due: now + Duration::seconds((interval * SECONDS_PER_DAY) as i64),
            last_review: now,
        }
    }

    /// Stability after a successful recall. The growth term is non-negative,
    /// so stability never shrinks on Hard, Good or Easy.
    fn stability_after_recall(
        &self,
        stability: f64,
        difficulty: f64,
        retrievability: f64,
        rating: Rating,
    ) -> f64 {
        let modifier = match rating {
            Rating::Hard => self.w[15],
            Rating::Easy => self.w[16],
            _ => 1.0,
        };
        let growth = self.w[8].exp()
            * (11.0 - difficulty)
            * stability.powf(-self.w[9])
            * ((self.w[10] * (1.0 - retrievability)).exp() - 1.0)
            * modifier;
        (stability * (1.0 + growth))
            .max(MIN_STABILITY)
            .min(self.maximum_interval)
    }

    /// Post-lapse stability. The raw curve can exceed the prior value at
    /// small stabilities, so the result is capped below it.
    fn stability_after_forget(&self, stability: f64, difficulty: f64, retrievability: f64) -> f64 {
        let relearned = self.w[11]
            * difficulty.powf(-self.w[12])
            * ((stability + 1.0).powf(self.w[13]) - 1.0)
            * (self.w[14] * (1.0 - retrievability)).exp();
        relearned
            .min(stability * LAPSE_RETENTION_CAP)
            .max(MIN_STABILITY)
    }

    /// Days until the next review for an updated stability, adjusted per
    /// rating: lapses come back within a day, Hard sooner than the model
    /// asks, Easy later. Bounded by `maximum_interval`.
    fn interval_days(&self, stability: f64, rating: Rating) -> f64 {
        let base = (stability * self.request_retention.ln() / INTERVAL_DECAY_BASE.ln())
            .max(1.0)
            .min(self.maximum_interval);
        match rating {
            Rating::Again => (base * 0.5).min(1.0),
            Rating::Hard => base * 0.8,
            Rating::Good => base,
            Rating::Easy => base * 1.3,
        }
    }
}

/// Fixed learning-step intervals for the very first review of an item.
fn first_interval(rating: Rating) -> Duration {
    match rating {
        Rating::Again => Duration::minutes(1),
        Rating::Hard => Duration::minutes(6),
        Rating::Good => Duration::hours(1),
        Rating::Easy => Duration::days(1),
    }
}

fn elapsed_days(last_review: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now.signed_duration_since(last_review).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0)
}
