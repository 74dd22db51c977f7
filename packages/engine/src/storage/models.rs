// ============================================================================
// Row models
// ============================================================================
//
// One struct per table. Each model knows how to read itself from a row and
// how to write itself back; query logic lives in the repository modules.
// SQLite storage conventions: ids are UUID v4 strings, booleans are INTEGER
// 0/1, timestamps are TEXT in '%Y-%m-%d %H:%M:%S' (UTC).

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Datetime helpers
// ============================================================================

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Day bucket used by `user_statistics.period_start`.
pub(crate) fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

/// Parses the storage format, falling back to RFC 3339 for rows written by
/// older exports. Unparseable values degrade to "now" rather than failing
/// the whole query.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Word
// ============================================================================

/// A dictation word, unique per (text, language). `text` is stored in its
/// canonical lowercased form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: String,
    pub text: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl Word {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            language: language.into(),
            created_at: Utc::now(),
        }
    }

    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            text: row.get("text")?,
            language: row.get("language")?,
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        })
    }

    pub fn insert(&self, conn: &Connection) -> SqliteResult<()> {
        conn.execute(
            "INSERT INTO word (id, text, language, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                self.id,
                self.text,
                self.language,
                format_datetime(&self.created_at)
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// ReviewState
// ============================================================================

/// Spaced-repetition scheduling state for one (user, word) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    pub id: String,
    pub user_id: String,
    pub word_id: String,
    pub easiness_factor: f64,
    pub interval_days: i64,
    pub repetitions: i32,
    pub next_review_at: DateTime<Utc>,
    pub last_review_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewState {
    /// Fresh state for a word the user has never reviewed. Due immediately.
    pub fn new(user_id: impl Into<String>, word_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            word_id: word_id.into(),
            easiness_factor: dictee_algo::DEFAULT_EASINESS_FACTOR,
            interval_days: 0,
            repetitions: 0,
            next_review_at: now,
            last_review_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            word_id: row.get("word_id")?,
            easiness_factor: row.get("easiness_factor")?,
            interval_days: row.get("interval_days")?,
            repetitions: row.get("repetitions")?,
            next_review_at: parse_datetime(&row.get::<_, String>("next_review_at")?),
            last_review_at: row
                .get::<_, Option<String>>("last_review_at")?
                .map(|s| parse_datetime(&s)),
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
            updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
        })
    }

    pub fn upsert(&self, conn: &Connection) -> SqliteResult<()> {
        conn.execute(
            "INSERT INTO review_state (
                id, user_id, word_id, easiness_factor, interval_days, repetitions,
                next_review_at, last_review_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (user_id, word_id) DO UPDATE SET
                easiness_factor = excluded.easiness_factor,
                interval_days = excluded.interval_days,
                repetitions = excluded.repetitions,
                next_review_at = excluded.next_review_at,
                last_review_at = excluded.last_review_at,
                updated_at = excluded.updated_at",
            params![
                self.id,
                self.user_id,
                self.word_id,
                self.easiness_factor,
                self.interval_days,
                self.repetitions,
                format_datetime(&self.next_review_at),
                self.last_review_at.as_ref().map(format_datetime),
                format_datetime(&self.created_at),
                format_datetime(&self.updated_at),
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    Custom,
    SpacedRepetition,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Custom => "custom",
            SessionMode::SpacedRepetition => "spaced-repetition",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "custom" => Some(SessionMode::Custom),
            "spaced-repetition" => Some(SessionMode::SpacedRepetition),
            _ => None,
        }
    }
}

/// One dictation run. `correct_words` and `average_response_ms` are
/// recomputed from the attempt set after every recorded answer, so the row
/// never drifts from its attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub mode: SessionMode,
    pub language: String,
    pub total_words: i64,
    pub correct_words: i64,
    pub average_response_ms: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        mode: SessionMode,
        language: impl Into<String>,
        total_words: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            mode,
            language: language.into(),
            total_words,
            correct_words: 0,
            average_response_ms: 0,
            started_at: now,
            ended_at: None,
            completed: false,
        }
    }

    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        let mode_str: String = row.get("mode")?;
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            mode: SessionMode::from_str(&mode_str).unwrap_or(SessionMode::Custom),
            language: row.get("language")?,
            total_words: row.get("total_words")?,
            correct_words: row.get("correct_words")?,
            average_response_ms: row.get("average_response_ms")?,
            started_at: parse_datetime(&row.get::<_, String>("started_at")?),
            ended_at: row
                .get::<_, Option<String>>("ended_at")?
                .map(|s| parse_datetime(&s)),
            completed: row.get::<_, i32>("completed")? != 0,
        })
    }

    pub fn insert(&self, conn: &Connection) -> SqliteResult<()> {
        conn.execute(
            "INSERT INTO session (
                id, user_id, mode, language, total_words, correct_words,
                average_response_ms, started_at, ended_at, completed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                self.id,
                self.user_id,
                self.mode.as_str(),
                self.language,
                self.total_words,
                self.correct_words,
                self.average_response_ms,
                format_datetime(&self.started_at),
                self.ended_at.as_ref().map(format_datetime),
                self.completed as i32,
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// Attempt
// ============================================================================

/// One answer for one word in one session. At most one per (session, word),
/// enforced by a UNIQUE constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub session_id: String,
    pub word_id: String,
    pub user_id: String,
    pub user_input: String,
    pub is_correct: bool,
    pub response_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl Attempt {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: impl Into<String>,
        word_id: impl Into<String>,
        user_id: impl Into<String>,
        user_input: impl Into<String>,
        is_correct: bool,
        response_time_ms: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            word_id: word_id.into(),
            user_id: user_id.into(),
            user_input: user_input.into(),
            is_correct,
            response_time_ms,
            created_at: now,
        }
    }

    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            word_id: row.get("word_id")?,
            user_id: row.get("user_id")?,
            user_input: row.get("user_input")?,
            is_correct: row.get::<_, i32>("is_correct")? != 0,
            response_time_ms: row.get("response_time_ms")?,
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        })
    }

    pub fn insert(&self, conn: &Connection) -> SqliteResult<()> {
        conn.execute(
            "INSERT INTO attempt (
                id, session_id, word_id, user_id, user_input, is_correct,
                response_time_ms, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.id,
                self.session_id,
                self.word_id,
                self.user_id,
                self.user_input,
                self.is_correct as i32,
                self.response_time_ms,
                format_datetime(&self.created_at),
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// Achievement catalog
// ============================================================================

/// Catalog row seeded by migration. `condition` holds the raw JSON payload;
/// the engine parses it into a typed condition when evaluating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: String,
    pub condition: String,
    pub parent_code: Option<String>,
    pub sort_order: i64,
}

impl Achievement {
    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            code: row.get("code")?,
            name: row.get("name")?,
            description: row.get("description")?,
            condition: row.get("condition")?,
            parent_code: row.get("parent_code")?,
            sort_order: row.get("sort_order")?,
        })
    }
}

// ============================================================================
// UserAchievement
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAchievement {
    pub id: String,
    pub user_id: String,
    pub achievement_id: String,
    pub achieved_at: DateTime<Utc>,
}

impl UserAchievement {
    pub fn new(
        user_id: impl Into<String>,
        achievement_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            achievement_id: achievement_id.into(),
            achieved_at: now,
        }
    }

    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            achievement_id: row.get("achievement_id")?,
            achieved_at: parse_datetime(&row.get::<_, String>("achieved_at")?),
        })
    }

    pub fn insert(&self, conn: &Connection) -> SqliteResult<()> {
        conn.execute(
            "INSERT INTO user_achievement (id, user_id, achievement_id, achieved_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.id,
                self.user_id,
                self.achievement_id,
                format_datetime(&self.achieved_at)
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// UserStatistics
// ============================================================================

/// Aggregated counters for one user and one day, recomputed from completed
/// sessions whenever one of that day's sessions finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub id: String,
    pub user_id: String,
    /// Day bucket in '%Y-%m-%d'.
    pub period_start: String,
    pub period_type: String,
    pub total_sessions: i64,
    pub total_words: i64,
    /// Distinct words answered correctly that day, not correct attempts.
    pub correct_words: i64,
    pub average_response_ms: i64,
    pub total_time_ms: i64,
    pub updated_at: DateTime<Utc>,
}

impl UserStatistics {
    pub fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            period_start: row.get("period_start")?,
            period_type: row.get("period_type")?,
            total_sessions: row.get("total_sessions")?,
            total_words: row.get("total_words")?,
            correct_words: row.get("correct_words")?,
            average_response_ms: row.get("average_response_ms")?,
            total_time_ms: row.get("total_time_ms")?,
            updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
        })
    }

    pub fn upsert(&self, conn: &Connection) -> SqliteResult<()> {
        conn.execute(
            "INSERT INTO user_statistics (
                id, user_id, period_start, period_type, total_sessions, total_words,
                correct_words, average_response_ms, total_time_ms, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (user_id, period_start, period_type) DO UPDATE SET
                total_sessions = excluded.total_sessions,
                total_words = excluded.total_words,
                correct_words = excluded.correct_words,
                average_response_ms = excluded.average_response_ms,
                total_time_ms = excluded.total_time_ms,
                updated_at = excluded.updated_at",
            params![
                self.id,
                self.user_id,
                self.period_start,
                self.period_type,
                self.total_sessions,
                self.total_words,
                self.correct_words,
                self.average_response_ms,
                self.total_time_ms,
                format_datetime(&self.updated_at),
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::run_migrations;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn datetime_roundtrip() {
        let now = Utc::now();
        let parsed = parse_datetime(&format_datetime(&now));
        // Sub-second precision is dropped by the storage format.
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn datetime_accepts_rfc3339() {
        let parsed = parse_datetime("2026-03-14T09:26:53Z");
        assert_eq!(format_datetime(&parsed), "2026-03-14 09:26:53");
    }

    #[test]
    fn session_mode_roundtrip() {
        for mode in [SessionMode::Custom, SessionMode::SpacedRepetition] {
            assert_eq!(SessionMode::from_str(mode.as_str()), Some(mode));
        }
        assert_eq!(SessionMode::from_str("cramming"), None);
    }

    #[test]
    fn word_insert_and_read_back() {
        let conn = test_conn();
        let word = Word::new("bonjour", "fr");
        word.insert(&conn).unwrap();

        let loaded = conn
            .query_row("SELECT * FROM word WHERE id = ?1", [&word.id], |row| {
                Word::from_row(row)
            })
            .unwrap();
        assert_eq!(loaded.text, "bonjour");
        assert_eq!(loaded.language, "fr");
    }

    #[test]
    fn duplicate_word_text_is_rejected_per_language() {
        let conn = test_conn();
        Word::new("chat", "fr").insert(&conn).unwrap();
        assert!(Word::new("chat", "fr").insert(&conn).is_err());
        // Same text under another language is a different word.
        Word::new("chat", "en").insert(&conn).unwrap();
    }

    #[test]
    fn review_state_upsert_replaces_schedule() {
        let conn = test_conn();
        let word = Word::new("maison", "fr");
        word.insert(&conn).unwrap();

        let now = Utc::now();
        let mut state = ReviewState::new("u1", &word.id, now);
        state.upsert(&conn).unwrap();

        state.repetitions = 1;
        state.interval_days = 1;
        state.last_review_at = Some(now);
        state.upsert(&conn).unwrap();

        let (count, reps): (i64, i32) = conn
            .query_row(
                "SELECT COUNT(*), MAX(repetitions) FROM review_state WHERE user_id = 'u1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(reps, 1);
    }

    #[test]
    fn attempt_unique_per_session_word() {
        let conn = test_conn();
        let word = Word::new("gato", "es");
        word.insert(&conn).unwrap();
        let now = Utc::now();
        let session = Session::new("u1", SessionMode::Custom, "es", 1, now);
        session.insert(&conn).unwrap();

        Attempt::new(&session.id, &word.id, "u1", "gato", true, 1200, now)
            .insert(&conn)
            .unwrap();
        let second = Attempt::new(&session.id, &word.id, "u1", "gato", true, 900, now);
        assert!(second.insert(&conn).is_err());
    }
}
