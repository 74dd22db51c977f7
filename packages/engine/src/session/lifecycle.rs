// ============================================================================
// Session lifecycle
// ============================================================================
//
// Creation and closing of sessions. A user has at most one open session;
// starting a new one closes whatever was still open inside the same
// transaction that creates the replacement.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::storage::attempt::AttemptRepository;
use crate::storage::review_state::ReviewStateRepository;
use crate::storage::session::SessionRepository;
use crate::storage::word::WordRepository;
use crate::storage::{Session, SessionMode, Storage, Word};
use crate::words;

/// How the word list of a new session is chosen.
#[derive(Debug, Clone)]
pub enum SessionPlan {
    /// Caller-provided word list, canonicalized and deduplicated.
    Custom { words: Vec<String> },
    /// Words pulled from the review queue, capped at `limit` (or the
    /// engine default when `None`).
    SpacedRepetition { limit: Option<usize> },
}

/// A start request whose inputs passed validation.
enum CheckedPlan {
    Custom { texts: Vec<String> },
    SpacedRepetition { limit: usize },
}

/// Result of a start request.
pub enum StartOutcome {
    Started {
        session: Session,
        /// In presentation order.
        words: Vec<Word>,
        /// Sessions that were implicitly completed to make room.
        closed: Vec<Session>,
    },
    /// Spaced-repetition start with an empty review queue. No session row
    /// is created and any open session stays open.
    NothingDue,
}

pub struct SessionLifecycle {
    storage: Arc<Storage>,
    default_due_limit: usize,
}

impl SessionLifecycle {
    pub fn new(storage: Arc<Storage>, default_due_limit: usize) -> Self {
        Self {
            storage,
            default_due_limit,
        }
    }

    /// Checks a start request without creating, closing, or writing
    /// anything. `start` applies the same rules itself; callers that must
    /// mutate state before `start` runs use this to reject bad input first.
    pub fn validate(&self, language: &str, plan: &SessionPlan) -> EngineResult<()> {
        self.check(language, plan).map(|_| ())
    }

    fn check(&self, language: &str, plan: &SessionPlan) -> EngineResult<CheckedPlan> {
        words::validate_language(language)?;
        match plan {
            SessionPlan::Custom { words: raw_words } => Ok(CheckedPlan::Custom {
                texts: words::prepare_word_list(raw_words)?,
            }),
            SessionPlan::SpacedRepetition { limit } => {
                let limit = limit.unwrap_or(self.default_due_limit);
                if limit == 0 {
                    return Err(EngineError::validation("due word limit must be positive"));
                }
                Ok(CheckedPlan::SpacedRepetition { limit })
            }
        }
    }

    pub fn start(
        &self,
        user_id: &str,
        language: &str,
        plan: SessionPlan,
    ) -> EngineResult<StartOutcome> {
        let checked = self.check(language, &plan)?;
        let now = Utc::now();

        match checked {
            CheckedPlan::Custom { texts } => {
                self.storage.transaction_with(|conn| {
                    let resolved =
                        WordRepository::find_or_create_all_internal(conn, language, &texts)?;
                    let word_ids: Vec<String> =
                        resolved.iter().map(|w| w.id.clone()).collect();
                    // First exposure puts the words on the review schedule.
                    ReviewStateRepository::ensure_defaults_internal(
                        conn, user_id, &word_ids, now,
                    )?;

                    let closed = SessionRepository::close_open_internal(conn, user_id, now)?;
                    let session = Session::new(
                        user_id,
                        SessionMode::Custom,
                        language,
                        resolved.len() as i64,
                        now,
                    );
                    SessionRepository::insert_with_words_internal(conn, &session, &resolved)?;
                    info!(
                        session_id = %session.id,
                        user_id,
                        words = resolved.len(),
                        "custom session started"
                    );
                    Ok(StartOutcome::Started {
                        session,
                        words: resolved,
                        closed,
                    })
                })
            }
            CheckedPlan::SpacedRepetition { limit } => {
                self.storage.transaction_with(|conn| {
                    let due = ReviewStateRepository::due_words_internal(
                        conn, user_id, language, limit, now,
                    )?;
                    if due.is_empty() {
                        return Ok(StartOutcome::NothingDue);
                    }

                    let closed = SessionRepository::close_open_internal(conn, user_id, now)?;
                    let session = Session::new(
                        user_id,
                        SessionMode::SpacedRepetition,
                        language,
                        due.len() as i64,
                        now,
                    );
                    SessionRepository::insert_with_words_internal(conn, &session, &due)?;
                    info!(
                        session_id = %session.id,
                        user_id,
                        words = due.len(),
                        "spaced-repetition session started"
                    );
                    Ok(StartOutcome::Started {
                        session,
                        words: due,
                        closed,
                    })
                })
            }
        }
    }

    /// Closes every open session of the user without creating a new one.
    pub fn close_open(&self, user_id: &str) -> EngineResult<Vec<Session>> {
        let now = Utc::now();
        let closed = self
            .storage
            .transaction(|conn| SessionRepository::close_open_internal(conn, user_id, now))?;
        Ok(closed)
    }

    /// Completes the open session before all words were answered. Recorded
    /// attempts keep counting; unanswered words simply have no attempt.
    pub fn end_early(&self, user_id: &str) -> EngineResult<Session> {
        let now = Utc::now();
        self.storage.transaction_with(|conn| {
            let session = match SessionRepository::get_open_for_user_internal(conn, user_id)? {
                Some(session) => session,
                None => return Err(EngineError::not_found("open session")),
            };
            SessionRepository::mark_completed_internal(conn, &session.id, now)?;

            let mut session = session;
            session.completed = true;
            session.ended_at = Some(now);
            info!(session_id = %session.id, user_id, "session ended early");
            Ok(session)
        })
    }

    /// The open session with its word list and recorded-attempt count, if
    /// one exists. Used to resume after a restart.
    pub fn open_run(&self, user_id: &str) -> EngineResult<Option<(Session, Vec<Word>, i64)>> {
        self.storage.transaction_with(|conn| {
            let session = match SessionRepository::get_open_for_user_internal(conn, user_id)? {
                Some(session) => session,
                None => return Ok(None),
            };
            let words = SessionRepository::words_for_session_internal(conn, &session.id)?;
            let (recorded, _, _) = AttemptRepository::session_totals_internal(conn, &session.id)?;
            Ok(Some((session, words, recorded)))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
