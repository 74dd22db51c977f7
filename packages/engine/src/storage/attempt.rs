// ============================================================================
// Attempt repository
// ============================================================================

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection};

use super::models::Attempt;
use super::{StorageError, StorageResult};

pub struct AttemptRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AttemptRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))
    }

    pub(crate) fn exists_internal(
        conn: &Connection,
        session_id: &str,
        word_id: &str,
    ) -> StorageResult<bool> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM attempt WHERE session_id = ?1 AND word_id = ?2
             )",
            [session_id, word_id],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    /// (recorded, correct, average response ms) over one session's attempts.
    pub fn session_totals(&self, session_id: &str) -> StorageResult<(i64, i64, i64)> {
        let conn = self.get_conn()?;
        Self::session_totals_internal(&conn, session_id)
    }

    pub(crate) fn session_totals_internal(
        conn: &Connection,
        session_id: &str,
    ) -> StorageResult<(i64, i64, i64)> {
        let totals = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(is_correct), 0),
                    CAST(ROUND(COALESCE(AVG(response_time_ms), 0)) AS INTEGER)
             FROM attempt WHERE session_id = ?1",
            [session_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(totals)
    }

    pub fn list_for_session(&self, session_id: &str) -> StorageResult<Vec<Attempt>> {
        let conn = self.get_conn()?;
        Self::list_for_session_internal(&conn, session_id)
    }

    pub(crate) fn list_for_session_internal(
        conn: &Connection,
        session_id: &str,
    ) -> StorageResult<Vec<Attempt>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM attempt WHERE session_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let attempts = stmt
            .query_map([session_id], Attempt::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attempts)
    }

    /// Correctness of the user's most recent attempts, newest first.
    pub fn recent_results(&self, user_id: &str, limit: usize) -> StorageResult<Vec<bool>> {
        let conn = self.get_conn()?;
        Self::recent_results_internal(&conn, user_id, limit)
    }

    pub(crate) fn recent_results_internal(
        conn: &Connection,
        user_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<bool>> {
        let mut stmt = conn.prepare(
            "SELECT is_correct FROM attempt WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let results = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(row.get::<_, i32>(0)? != 0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    pub fn count_for_user(&self, user_id: &str) -> StorageResult<i64> {
        let conn = self.get_conn()?;
        Self::count_for_user_internal(&conn, user_id)
    }

    pub(crate) fn count_for_user_internal(conn: &Connection, user_id: &str) -> StorageResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM attempt WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// How many distinct words the user has ever answered correctly.
    pub fn distinct_correct_words(&self, user_id: &str) -> StorageResult<i64> {
        let conn = self.get_conn()?;
        Self::distinct_correct_words_internal(&conn, user_id)
    }

    pub(crate) fn distinct_correct_words_internal(
        conn: &Connection,
        user_id: &str,
    ) -> StorageResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT word_id) FROM attempt
             WHERE user_id = ?1 AND is_correct = 1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{Session, SessionMode, Word};
    use crate::storage::{SessionRepository, Storage};
    use chrono::{Duration, Utc};

    fn seed_session(storage: &Storage, texts: &[&str]) -> (Session, Vec<Word>) {
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let words = storage.words().find_or_create_all("en", &texts).unwrap();
        let session = Session::new("u1", SessionMode::Custom, "en", words.len() as i64, Utc::now());
        storage
            .transaction(|conn| {
                SessionRepository::insert_with_words_internal(conn, &session, &words)
            })
            .unwrap();
        (session, words)
    }

    #[test]
    fn session_totals_track_all_attempts() {
        let storage = Storage::in_memory().unwrap();
        let (session, words) = seed_session(&storage, &["a", "b", "c"]);
        let now = Utc::now();

        storage
            .transaction(|conn| {
                Attempt::new(&session.id, &words[0].id, "u1", "a", true, 1000, now)
                    .insert(conn)?;
                Attempt::new(&session.id, &words[1].id, "u1", "x", false, 2000, now)
                    .insert(conn)?;
                Ok(())
            })
            .unwrap();

        let (count, correct, avg) = storage
            .transaction(|conn| AttemptRepository::session_totals_internal(conn, &session.id))
            .unwrap();
        assert_eq!((count, correct, avg), (2, 1, 1500));
    }

    #[test]
    fn session_totals_on_empty_session_are_zero() {
        let storage = Storage::in_memory().unwrap();
        let (session, _) = seed_session(&storage, &["a"]);

        let totals = storage
            .transaction(|conn| AttemptRepository::session_totals_internal(conn, &session.id))
            .unwrap();
        assert_eq!(totals, (0, 0, 0));
    }

    #[test]
    fn recent_results_are_newest_first() {
        let storage = Storage::in_memory().unwrap();
        let (session, words) = seed_session(&storage, &["a", "b", "c"]);
        let base = Utc::now();

        storage
            .transaction(|conn| {
                for (i, (word, ok)) in words.iter().zip([true, false, true]).enumerate() {
                    let at = base + Duration::seconds(i as i64);
                    Attempt::new(&session.id, &word.id, "u1", "x", ok, 500, at).insert(conn)?;
                }
                Ok(())
            })
            .unwrap();

        let recent = storage.attempts().recent_results("u1", 2).unwrap();
        assert_eq!(recent, vec![true, false]);
    }

    #[test]
    fn distinct_correct_ignores_repeats_and_failures() {
        let storage = Storage::in_memory().unwrap();
        let (s1, words) = seed_session(&storage, &["a", "b"]);
        let (s2, _) = seed_session(&storage, &["c"]);
        let now = Utc::now();

        storage
            .transaction(|conn| {
                Attempt::new(&s1.id, &words[0].id, "u1", "a", true, 500, now).insert(conn)?;
                Attempt::new(&s1.id, &words[1].id, "u1", "?", false, 500, now).insert(conn)?;
                // Same word answered correctly again in another session.
                Attempt::new(&s2.id, &words[0].id, "u1", "a", true, 500, now).insert(conn)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(storage.attempts().distinct_correct_words("u1").unwrap(), 1);
    }
}
