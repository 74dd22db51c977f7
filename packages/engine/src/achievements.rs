// ============================================================================
// Achievements
// ============================================================================
//
// The catalog lives in the `achievement` table with a JSON condition per row,
// so new badges ship as data. Evaluation is idempotent: already-unlocked
// achievements are skipped, and the UNIQUE(user_id, achievement_id)
// constraint backs that check inside the awarding transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::storage::achievement::AchievementRepository;
use crate::storage::attempt::AttemptRepository;
use crate::storage::{Achievement, Attempt, Session, Storage, UserAchievement};

// ============================================================================
// Conditions
// ============================================================================

/// Typed form of the catalog's JSON `condition` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AchievementCondition {
    /// Any attempt was ever recorded.
    FirstWord,
    /// A correct answer faster than `max_ms`.
    FastResponse { max_ms: i64 },
    /// A completed session of at least `min_words` words, all correct.
    PerfectScore { min_words: i64 },
    /// The user's latest `window` attempts were all correct.
    PerfectStreak { window: i64 },
    /// At least `threshold` distinct words answered correctly, ever.
    WordsMastered {
        threshold: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tier: Option<i32>,
    },
}

fn parse_condition(definition: &Achievement) -> Option<AchievementCondition> {
    match serde_json::from_str(&definition.condition) {
        Ok(condition) => Some(condition),
        Err(e) => {
            warn!(
                code = %definition.code,
                error = %e,
                "skipping achievement with unreadable condition"
            );
            None
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Facts a single evaluation pass runs against. Attempt-level conditions
/// only fire when `attempt` is set, completion-level ones when `session` is.
struct EvalInput<'a> {
    attempt: Option<&'a Attempt>,
    session: Option<&'a Session>,
    total_attempts: i64,
    distinct_correct: i64,
    /// Newest first.
    recent_results: &'a [bool],
}

fn is_eligible(condition: &AchievementCondition, input: &EvalInput) -> bool {
    match condition {
        AchievementCondition::FirstWord => input.attempt.is_some() && input.total_attempts >= 1,
        AchievementCondition::FastResponse { max_ms } => input
            .attempt
            .is_some_and(|a| a.is_correct && a.response_time_ms < *max_ms),
        AchievementCondition::PerfectScore { min_words } => input
            .session
            .is_some_and(|s| s.total_words >= *min_words && s.correct_words == s.total_words),
        AchievementCondition::PerfectStreak { window } => {
            let window = *window as usize;
            input.session.is_some()
                && window > 0
                && input.recent_results.len() >= window
                && input.recent_results[..window].iter().all(|ok| *ok)
        }
        AchievementCondition::WordsMastered { threshold, .. } => {
            input.session.is_some() && input.distinct_correct >= *threshold
        }
    }
}

// ============================================================================
// Public result types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UnlockedAchievement {
    pub code: String,
    pub name: String,
    pub description: String,
    pub achieved_at: DateTime<Utc>,
}

/// One catalog entry plus the user's unlock state, for display.
#[derive(Debug, Clone, Serialize)]
pub struct AchievementStatus {
    pub code: String,
    pub name: String,
    pub description: String,
    pub parent_code: Option<String>,
    pub unlocked_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Evaluator
// ============================================================================

pub struct AchievementEvaluator {
    storage: Arc<Storage>,
}

impl AchievementEvaluator {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Evaluates attempt-level achievements right after an answer was
    /// recorded. Returns the newly unlocked ones.
    pub fn after_attempt(&self, attempt: &Attempt) -> EngineResult<Vec<UnlockedAchievement>> {
        let now = Utc::now();
        self.storage.transaction_with(|conn| {
            let total_attempts =
                AttemptRepository::count_for_user_internal(conn, &attempt.user_id)?;
            let input = EvalInput {
                attempt: Some(attempt),
                session: None,
                total_attempts,
                distinct_correct: 0,
                recent_results: &[],
            };
            Self::award_eligible(conn, &attempt.user_id, now, &input)
        })
    }

    /// Evaluates completion-level achievements for a session that just
    /// transitioned to completed.
    pub fn after_completion(&self, session: &Session) -> EngineResult<Vec<UnlockedAchievement>> {
        let now = Utc::now();
        self.storage.transaction_with(|conn| {
            let definitions = AchievementRepository::all_internal(conn)?;
            let longest_window = definitions
                .iter()
                .filter_map(parse_condition)
                .filter_map(|c| match c {
                    AchievementCondition::PerfectStreak { window } => Some(window),
                    _ => None,
                })
                .max()
                .unwrap_or(0);

            let recent = if longest_window > 0 {
                AttemptRepository::recent_results_internal(
                    conn,
                    &session.user_id,
                    longest_window as usize,
                )?
            } else {
                Vec::new()
            };
            let distinct_correct =
                AttemptRepository::distinct_correct_words_internal(conn, &session.user_id)?;

            let input = EvalInput {
                attempt: None,
                session: Some(session),
                total_attempts: 0,
                distinct_correct,
                recent_results: &recent,
            };
            Self::award_eligible(conn, &session.user_id, now, &input)
        })
    }

    fn award_eligible(
        conn: &Connection,
        user_id: &str,
        now: DateTime<Utc>,
        input: &EvalInput,
    ) -> EngineResult<Vec<UnlockedAchievement>> {
        let definitions = AchievementRepository::all_internal(conn)?;
        let unlocked = AchievementRepository::unlocked_ids_internal(conn, user_id)?;

        let mut newly = Vec::new();
        for definition in definitions {
            if unlocked.contains(&definition.id) {
                continue;
            }
            let Some(condition) = parse_condition(&definition) else {
                continue;
            };
            if !is_eligible(&condition, input) {
                continue;
            }

            AchievementRepository::record_unlock_internal(
                conn,
                &UserAchievement::new(user_id, &definition.id, now),
            )?;
            info!(user_id, code = %definition.code, "achievement unlocked");
            newly.push(UnlockedAchievement {
                code: definition.code,
                name: definition.name,
                description: definition.description,
                achieved_at: now,
            });
        }
        Ok(newly)
    }

    /// Full catalog with the user's unlock timestamps, in display order.
    pub fn overview(&self, user_id: &str) -> EngineResult<Vec<AchievementStatus>> {
        let definitions = self.storage.achievements().all()?;
        let unlocks = self.storage.achievements().unlocks_for_user(user_id)?;
        let achieved: std::collections::HashMap<String, DateTime<Utc>> = unlocks
            .into_iter()
            .map(|u| (u.achievement_id, u.achieved_at))
            .collect();

        Ok(definitions
            .into_iter()
            .map(|d| AchievementStatus {
                unlocked_at: achieved.get(&d.id).copied(),
                code: d.code,
                name: d.name,
                description: d.description,
                parent_code: d.parent_code,
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
