// ============================================================================
// Review scheduling
// ============================================================================
//
// Bridges the pure SM-2 crate and the persisted per-word review states.
// Each review is load-transition-store inside one transaction, so concurrent
// reviews of the same (user, word) pair cannot lose updates.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use dictee_algo::{next_state, quality_for_answer, Sm2Error, Sm2State, MAX_QUALITY};

use crate::error::EngineResult;
use crate::storage::review_state::ReviewStateRepository;
use crate::storage::{Attempt, ReviewState, Storage, Word};

/// Snapshot of one user's review queue for a language.
#[derive(Debug, Clone, Serialize)]
pub struct DueOverview {
    /// Words whose deadline has passed.
    pub due_now: i64,
    /// Earliest deadline among all tracked words, if any are tracked.
    pub next_due_at: Option<DateTime<Utc>>,
}

pub struct ReviewScheduler {
    storage: Arc<Storage>,
}

impl ReviewScheduler {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Words due for review right now, in queue order.
    pub fn due_words(
        &self,
        user_id: &str,
        language: &str,
        limit: usize,
    ) -> EngineResult<Vec<Word>> {
        let due = self
            .storage
            .review_states()
            .due_words(user_id, language, limit, Utc::now())?;
        Ok(due)
    }

    /// Starts tracking words the user has never reviewed. Existing schedules
    /// are left untouched.
    pub fn ensure_tracked(&self, user_id: &str, words: &[Word]) -> EngineResult<()> {
        let ids: Vec<String> = words.iter().map(|w| w.id.clone()).collect();
        let now = Utc::now();
        self.storage.transaction(|conn| {
            ReviewStateRepository::ensure_defaults_internal(conn, user_id, &ids, now)
        })?;
        Ok(())
    }

    /// Applies one graded review to the word's schedule and persists the
    /// result. Unknown words start from the default state.
    pub fn record_review(
        &self,
        user_id: &str,
        word_id: &str,
        quality: u8,
    ) -> EngineResult<ReviewState> {
        if quality > MAX_QUALITY {
            return Err(Sm2Error::InvalidQuality(quality).into());
        }
        let now = Utc::now();

        self.storage.transaction_with(|conn| {
            let current = ReviewStateRepository::get_internal(conn, user_id, word_id)?
                .unwrap_or_else(|| ReviewState::new(user_id, word_id, now));

            let schedule = Sm2State {
                easiness_factor: current.easiness_factor,
                interval_days: current.interval_days,
                repetitions: current.repetitions,
            };
            let next = next_state(&schedule, quality)?;

            let mut updated = current;
            updated.easiness_factor = next.easiness_factor;
            updated.interval_days = next.interval_days;
            updated.repetitions = next.repetitions;
            updated.last_review_at = Some(now);
            updated.next_review_at = now + Duration::days(next.interval_days);
            updated.updated_at = now;
            ReviewStateRepository::upsert_internal(conn, &updated)?;

            debug!(
                user_id,
                word_id,
                quality,
                interval_days = updated.interval_days,
                "review recorded"
            );
            Ok(updated)
        })
    }

    /// Folds a completed session's attempts into the schedule, one graded
    /// review per recorded attempt.
    pub fn apply_session_reviews(&self, user_id: &str, attempts: &[Attempt]) -> EngineResult<()> {
        for attempt in attempts {
            let quality = quality_for_answer(attempt.is_correct);
            self.record_review(user_id, &attempt.word_id, quality)?;
        }
        Ok(())
    }

    pub fn due_overview(&self, user_id: &str, language: &str) -> EngineResult<DueOverview> {
        let (due_now, next_due_at) = self
            .storage
            .review_states()
            .due_overview(user_id, language, Utc::now())?;
        Ok(DueOverview {
            due_now,
            next_due_at,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
