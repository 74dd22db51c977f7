// ============================================================================
// Session repository
// ============================================================================

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::models::{format_datetime, Session, Word};
use super::{StorageError, StorageResult};

pub struct SessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SessionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// Inserts a session together with its ordered word list.
    pub(crate) fn insert_with_words_internal(
        conn: &Connection,
        session: &Session,
        words: &[Word],
    ) -> StorageResult<()> {
        session.insert(conn)?;
        for (position, word) in words.iter().enumerate() {
            conn.execute(
                "INSERT INTO session_word (session_id, word_id, position) VALUES (?1, ?2, ?3)",
                params![session.id, word.id, position as i64],
            )?;
        }
        Ok(())
    }

    /// Completes every still-open session of the user and returns the closed
    /// rows in their final shape. Normally returns zero or one session.
    pub(crate) fn close_open_internal(
        conn: &Connection,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<Session>> {
        let mut stmt =
            conn.prepare("SELECT * FROM session WHERE user_id = ?1 AND completed = 0")?;
        let open = stmt
            .query_map([user_id], Session::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut closed = Vec::with_capacity(open.len());
        for mut session in open {
            conn.execute(
                "UPDATE session SET completed = 1, ended_at = ?1 WHERE id = ?2",
                params![format_datetime(&now), session.id],
            )?;
            session.completed = true;
            session.ended_at = Some(now);
            closed.push(session);
        }
        Ok(closed)
    }

    pub fn get(&self, id: &str) -> StorageResult<Option<Session>> {
        let conn = self.get_conn()?;
        Self::get_internal(&conn, id)
    }

    pub(crate) fn get_internal(conn: &Connection, id: &str) -> StorageResult<Option<Session>> {
        match conn.query_row("SELECT * FROM session WHERE id = ?1", [id], Session::from_row) {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_open_for_user(&self, user_id: &str) -> StorageResult<Option<Session>> {
        let conn = self.get_conn()?;
        Self::get_open_for_user_internal(&conn, user_id)
    }

    pub(crate) fn get_open_for_user_internal(
        conn: &Connection,
        user_id: &str,
    ) -> StorageResult<Option<Session>> {
        match conn.query_row(
            "SELECT * FROM session WHERE user_id = ?1 AND completed = 0
             ORDER BY started_at DESC LIMIT 1",
            [user_id],
            Session::from_row,
        ) {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The session's words in presentation order.
    pub fn words_for_session(&self, session_id: &str) -> StorageResult<Vec<Word>> {
        let conn = self.get_conn()?;
        Self::words_for_session_internal(&conn, session_id)
    }

    pub(crate) fn words_for_session_internal(
        conn: &Connection,
        session_id: &str,
    ) -> StorageResult<Vec<Word>> {
        let mut stmt = conn.prepare(
            "SELECT w.* FROM session_word sw
             JOIN word w ON w.id = sw.word_id
             WHERE sw.session_id = ?1
             ORDER BY sw.position ASC",
        )?;
        let words = stmt
            .query_map([session_id], Word::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(words)
    }

    pub(crate) fn contains_word_internal(
        conn: &Connection,
        session_id: &str,
        word_id: &str,
    ) -> StorageResult<bool> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM session_word WHERE session_id = ?1 AND word_id = ?2
             )",
            [session_id, word_id],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    pub(crate) fn update_aggregates_internal(
        conn: &Connection,
        session_id: &str,
        correct_words: i64,
        average_response_ms: i64,
    ) -> StorageResult<()> {
        conn.execute(
            "UPDATE session SET correct_words = ?1, average_response_ms = ?2 WHERE id = ?3",
            params![correct_words, average_response_ms, session_id],
        )?;
        Ok(())
    }

    /// Marks the session completed. Returns false when it was already
    /// completed, which makes the completion transition exactly-once.
    pub(crate) fn mark_completed_internal(
        conn: &Connection,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let changed = conn.execute(
            "UPDATE session SET completed = 1, ended_at = ?1 WHERE id = ?2 AND completed = 0",
            params![format_datetime(&now), session_id],
        )?;
        Ok(changed > 0)
    }

    /// Most recent sessions first.
    pub fn history(&self, user_id: &str, limit: usize) -> StorageResult<Vec<Session>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM session WHERE user_id = ?1
             ORDER BY started_at DESC, id ASC LIMIT ?2",
        )?;
        let sessions = stmt
            .query_map(params![user_id, limit as i64], Session::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }
}

// ============================================================================
// Tests
// ============================================================================
