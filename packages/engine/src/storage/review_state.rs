// ============================================================================
// Review state repository
// ============================================================================

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::models::{format_datetime, parse_datetime, ReviewState, Word};
use super::{StorageError, StorageResult};

pub struct ReviewStateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReviewStateRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))
    }

    pub fn get(&self, user_id: &str, word_id: &str) -> StorageResult<Option<ReviewState>> {
        let conn = self.get_conn()?;
        Self::get_internal(&conn, user_id, word_id)
    }

    pub(crate) fn get_internal(
        conn: &Connection,
        user_id: &str,
        word_id: &str,
    ) -> StorageResult<Option<ReviewState>> {
        match conn.query_row(
            "SELECT * FROM review_state WHERE user_id = ?1 AND word_id = ?2",
            [user_id, word_id],
            ReviewState::from_row,
        ) {
            Ok(state) => Ok(Some(state)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn upsert(&self, state: &ReviewState) -> StorageResult<()> {
        let conn = self.get_conn()?;
        Self::upsert_internal(&conn, state)
    }

    pub(crate) fn upsert_internal(conn: &Connection, state: &ReviewState) -> StorageResult<()> {
        state.upsert(conn)?;
        Ok(())
    }

    /// Creates default (immediately due) states for words the user has never
    /// seen, leaving existing schedules untouched.
    pub(crate) fn ensure_defaults_internal(
        conn: &Connection,
        user_id: &str,
        word_ids: &[String],
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        for word_id in word_ids {
            let state = ReviewState::new(user_id, word_id.clone(), now);
            conn.execute(
                "INSERT OR IGNORE INTO review_state (
                    id, user_id, word_id, easiness_factor, interval_days, repetitions,
                    next_review_at, last_review_at, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    state.id,
                    state.user_id,
                    state.word_id,
                    state.easiness_factor,
                    state.interval_days,
                    state.repetitions,
                    format_datetime(&state.next_review_at),
                    state.last_review_at.as_ref().map(format_datetime),
                    format_datetime(&state.created_at),
                    format_datetime(&state.updated_at),
                ],
            )?;
        }
        Ok(())
    }

    /// Words due for review, earliest deadline first. Ties break on the
    /// shorter interval (weaker word first), then on word text for a stable
    /// order.
    pub fn due_words(
        &self,
        user_id: &str,
        language: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<Word>> {
        let conn = self.get_conn()?;
        Self::due_words_internal(&conn, user_id, language, limit, now)
    }

    pub(crate) fn due_words_internal(
        conn: &Connection,
        user_id: &str,
        language: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<Word>> {
        let mut stmt = conn.prepare(
            "SELECT w.* FROM review_state rs
             JOIN word w ON w.id = rs.word_id
             WHERE rs.user_id = ?1 AND w.language = ?2 AND rs.next_review_at <= ?3
             ORDER BY rs.next_review_at ASC, rs.interval_days ASC, w.text ASC
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            params![user_id, language, format_datetime(&now), limit as i64],
            Word::from_row,
        )?;
        let words = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(words)
    }

    /// (due now, earliest deadline) for the user's queue in one language.
    pub fn due_overview(
        &self,
        user_id: &str,
        language: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<(i64, Option<DateTime<Utc>>)> {
        let conn = self.get_conn()?;

        let due_now: i64 = conn.query_row(
            "SELECT COUNT(*) FROM review_state rs
             JOIN word w ON w.id = rs.word_id
             WHERE rs.user_id = ?1 AND w.language = ?2 AND rs.next_review_at <= ?3",
            params![user_id, language, format_datetime(&now)],
            |row| row.get(0),
        )?;

        let next_due: Option<String> = conn.query_row(
            "SELECT MIN(rs.next_review_at) FROM review_state rs
             JOIN word w ON w.id = rs.word_id
             WHERE rs.user_id = ?1 AND w.language = ?2",
            params![user_id, language],
            |row| row.get(0),
        )?;

        Ok((due_now, next_due.as_deref().map(parse_datetime)))
    }
}

// ============================================================================
// Tests
// ============================================================================
