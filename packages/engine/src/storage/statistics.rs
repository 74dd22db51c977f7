// ============================================================================
// Statistics repository
// ============================================================================

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::models::{format_datetime, UserStatistics};
use super::{StorageError, StorageResult};

pub struct StatisticsRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StatisticsRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// Recomputes the daily row for `day` ('%Y-%m-%d') from the completed
    /// sessions that ended on that day, then upserts it. Recomputing from
    /// scratch keeps the row correct no matter how many sessions finish on
    /// the same day or in which order.
    pub(crate) fn refresh_daily_internal(
        conn: &Connection,
        user_id: &str,
        day: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<UserStatistics> {
        let (total_sessions, total_time_ms): (i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM((strftime('%s', ended_at) - strftime('%s', started_at)) * 1000), 0)
             FROM session
             WHERE user_id = ?1 AND completed = 1 AND ended_at IS NOT NULL
               AND date(ended_at) = ?2",
            params![user_id, day],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        // correct_words counts distinct words answered correctly that day,
        // so repeating a word across sessions does not inflate it.
        let (total_words, correct_words, average_response_ms): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(a.id),
                    COUNT(DISTINCT CASE WHEN a.is_correct = 1 THEN a.word_id END),
                    CAST(ROUND(COALESCE(AVG(a.response_time_ms), 0)) AS INTEGER)
             FROM attempt a
             JOIN session s ON s.id = a.session_id
             WHERE s.user_id = ?1 AND s.completed = 1 AND s.ended_at IS NOT NULL
               AND date(s.ended_at) = ?2",
            params![user_id, day],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let row = UserStatistics {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            period_start: day.to_string(),
            period_type: "daily".to_string(),
            total_sessions,
            total_words,
            correct_words,
            average_response_ms,
            total_time_ms,
            updated_at: now,
        };
        row.upsert(conn)?;

        // Read back so the caller sees the stored id when the upsert hit an
        // existing row.
        Self::get_daily_internal(conn, user_id, day)?
            .ok_or_else(|| StorageError::NotFound("user_statistics".to_string()))
    }

    pub fn get_daily(&self, user_id: &str, day: &str) -> StorageResult<Option<UserStatistics>> {
        let conn = self.get_conn()?;
        Self::get_daily_internal(&conn, user_id, day)
    }

    pub(crate) fn get_daily_internal(
        conn: &Connection,
        user_id: &str,
        day: &str,
    ) -> StorageResult<Option<UserStatistics>> {
        match conn.query_row(
            "SELECT * FROM user_statistics
             WHERE user_id = ?1 AND period_start = ?2 AND period_type = 'daily'",
            [user_id, day],
            UserStatistics::from_row,
        ) {
            Ok(stats) => Ok(Some(stats)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Daily rows in [from, to], oldest first. Days without completed
    /// sessions have no row.
    pub fn range_daily(
        &self,
        user_id: &str,
        from_day: &str,
        to_day: &str,
    ) -> StorageResult<Vec<UserStatistics>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM user_statistics
             WHERE user_id = ?1 AND period_type = 'daily'
               AND period_start >= ?2 AND period_start <= ?3
             ORDER BY period_start ASC",
        )?;
        let rows = stmt
            .query_map([user_id, from_day, to_day], UserStatistics::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ============================================================================
// Tests
// ============================================================================
