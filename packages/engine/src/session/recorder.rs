// ============================================================================
// Attempt recording
// ============================================================================
//
// One transaction per answer: duplicate check, grading, the attempt insert,
// the aggregate recompute and the completion transition all commit together
// or not at all. The UNIQUE(session_id, word_id) constraint backs the
// duplicate check, so an attempt can never be counted twice.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::storage::attempt::AttemptRepository;
use crate::storage::session::SessionRepository;
use crate::storage::{Attempt, Session, Storage, StorageError, Word};
use crate::words;

/// What one recorded answer did to the session.
#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    pub attempt: Attempt,
    /// Session row after aggregates (and possibly completion) were applied.
    pub session: Session,
    pub attempts_recorded: i64,
    /// True when this attempt was the one that completed the session.
    pub completed_now: bool,
}

pub struct AttemptRecorder {
    storage: Arc<Storage>,
}

impl AttemptRecorder {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Grades and records one answer for `word` in the session.
    pub fn record(
        &self,
        session_id: &str,
        word: &Word,
        user_input: &str,
        response_time_ms: u32,
    ) -> EngineResult<RecordedAttempt> {
        let now = Utc::now();

        self.storage.transaction_with(|conn| {
            let session = match SessionRepository::get_internal(conn, session_id)? {
                Some(session) => session,
                None => return Err(EngineError::not_found("session")),
            };
            // Duplicate check first: a retried final answer reports as a
            // duplicate, not as a completed-session conflict.
            if AttemptRepository::exists_internal(conn, session_id, &word.id)? {
                return Err(EngineError::DuplicateAttempt {
                    word_id: word.id.clone(),
                });
            }
            if session.completed {
                return Err(EngineError::conflict("session is already completed"));
            }
            if !SessionRepository::contains_word_internal(conn, session_id, &word.id)? {
                return Err(EngineError::validation("word is not part of this session"));
            }

            let is_correct = words::grade_answer(user_input, &word.text);
            let attempt = Attempt::new(
                session_id,
                &word.id,
                &session.user_id,
                user_input.trim(),
                is_correct,
                i64::from(response_time_ms),
                now,
            );
            attempt
                .insert(conn)
                .map_err(|e| duplicate_or_storage(e, &word.id))?;

            let (recorded, correct, average) =
                AttemptRepository::session_totals_internal(conn, session_id)?;
            SessionRepository::update_aggregates_internal(conn, session_id, correct, average)?;

            let mut updated = session;
            updated.correct_words = correct;
            updated.average_response_ms = average;

            let mut completed_now = false;
            if recorded >= updated.total_words {
                completed_now =
                    SessionRepository::mark_completed_internal(conn, session_id, now)?;
                if completed_now {
                    updated.completed = true;
                    updated.ended_at = Some(now);
                }
            }

            debug!(
                session_id,
                word_id = %word.id,
                is_correct,
                recorded,
                completed = completed_now,
                "attempt recorded"
            );
            Ok(RecordedAttempt {
                attempt,
                session: updated,
                attempts_recorded: recorded,
                completed_now,
            })
        })
    }
}

/// A UNIQUE violation on insert means another writer recorded this word
/// between our check and our insert.
fn duplicate_or_storage(e: rusqlite::Error, word_id: &str) -> EngineError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            EngineError::DuplicateAttempt {
                word_id: word_id.to_string(),
            }
        }
        _ => EngineError::Storage(StorageError::from(e)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::lifecycle::{SessionLifecycle, SessionPlan, StartOutcome};

    fn session_with_words(texts: &[&str]) -> (AttemptRecorder, Arc<Storage>, Session, Vec<Word>) {
        let storage = Arc::new(Storage::in_memory().unwrap());
        let lifecycle = SessionLifecycle::new(Arc::clone(&storage), 20);
        let plan = SessionPlan::Custom {
            words: texts.iter().map(|t| t.to_string()).collect(),
        };
        let (session, words) = match lifecycle.start("u1", "fr", plan).unwrap() {
            StartOutcome::Started { session, words, .. } => (session, words),
            StartOutcome::NothingDue => panic!("expected a session"),
        };
        (AttemptRecorder::new(Arc::clone(&storage)), storage, session, words)
    }

    #[test]
    fn grading_is_case_and_whitespace_insensitive() {
        let (recorder, _s, session, words) = session_with_words(&["chat", "chien"]);

        let rec = recorder.record(&session.id, &words[0], "  Chat ", 1500).unwrap();
        assert!(rec.attempt.is_correct);
        assert_eq!(rec.attempt.user_input, "Chat");
        assert_eq!(rec.session.correct_words, 1);
        assert!(!rec.completed_now);
    }

    #[test]
    fn second_answer_for_the_same_word_is_rejected() {
        let (recorder, storage, session, words) = session_with_words(&["chat", "chien"]);

        recorder.record(&session.id, &words[0], "chat", 1000).unwrap();
        let err = recorder.record(&session.id, &words[0], "chat", 900).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateAttempt { .. }));

        // Aggregates were not disturbed by the rejected retry.
        let (recorded, correct, average) =
            storage.attempts().session_totals(&session.id).unwrap();
        assert_eq!((recorded, correct, average), (1, 1, 1000));
    }

    #[test]
    fn final_word_completes_the_session() {
        let (recorder, storage, session, words) = session_with_words(&["un", "deux"]);

        let first = recorder.record(&session.id, &words[0], "un", 1000).unwrap();
        assert!(!first.completed_now);

        let second = recorder.record(&session.id, &words[1], "duex", 3000).unwrap();
        assert!(second.completed_now);
        assert!(second.session.completed);
        assert!(!second.attempt.is_correct);
        assert_eq!(second.session.correct_words, 1);
        assert_eq!(second.session.average_response_ms, 2000);

        let stored = storage.sessions().get(&session.id).unwrap().unwrap();
        assert!(stored.completed);
        assert!(stored.ended_at.is_some());
    }

    #[test]
    fn retrying_the_final_word_reports_duplicate_not_conflict() {
        let (recorder, _s, session, words) = session_with_words(&["seul"]);

        let rec = recorder.record(&session.id, &words[0], "seul", 800).unwrap();
        assert!(rec.completed_now);

        let err = recorder.record(&session.id, &words[0], "seul", 800).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateAttempt { .. }));
    }

    #[test]
    fn words_outside_the_session_are_rejected() {
        let (recorder, storage, session, _words) = session_with_words(&["dedans"]);
        let outsider = storage
            .words()
            .find_or_create_all("fr", &["dehors".to_string()])
            .unwrap()
            .remove(0);

        let err = recorder.record(&session.id, &outsider, "dehors", 500).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn unknown_session_is_not_found() {
        let (recorder, _s, _session, words) = session_with_words(&["mot"]);
        let err = recorder.record("missing", &words[0], "mot", 500).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn empty_input_counts_as_incorrect() {
        let (recorder, _s, session, words) = session_with_words(&["mot", "deux"]);
        let rec = recorder.record(&session.id, &words[0], "", 10_000).unwrap();
        assert!(!rec.attempt.is_correct);
        assert_eq!(rec.session.correct_words, 0);
    }
}
