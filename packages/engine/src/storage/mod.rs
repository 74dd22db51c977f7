// ============================================================================
// Storage layer
// ============================================================================
//
// SQLite-backed persistence behind a single shared connection. All repository
// handles clone the same `Arc<Mutex<Connection>>`, so every statement is
// serialized; multi-statement invariants additionally go through
// `Storage::transaction`.

pub mod achievement;
pub mod attempt;
pub mod migrations;
pub mod models;
pub mod review_state;
pub mod session;
pub mod statistics;
pub mod word;

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

pub use achievement::AchievementRepository;
pub use attempt::AttemptRepository;
pub use models::{
    Achievement, Attempt, ReviewState, Session, SessionMode, UserAchievement, UserStatistics, Word,
};
pub use review_state::ReviewStateRepository;
pub use session::SessionRepository;
pub use statistics::StatisticsRepository;
pub use word::WordRepository;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("lock error: {0}")]
    Lock(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================================
// Storage
// ============================================================================

/// Owns the SQLite connection and hands out repository views onto it.
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl Storage {
    /// Opens (or creates) the database file and brings the schema up to date.
    pub fn open(db_path: impl Into<String>) -> StorageResult<Self> {
        let db_path = db_path.into();
        let connection = Connection::open(&db_path)?;

        connection.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -64000;",
        )?;

        migrations::run_migrations(&connection)?;
        info!(path = %db_path, "storage opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(connection)),
            db_path,
        })
    }

    /// In-memory database for tests. WAL does not apply here.
    pub fn in_memory() -> StorageResult<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -64000;",
        )?;
        migrations::run_migrations(&connection)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(connection)),
            db_path: ":memory:".to_string(),
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    fn get_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// Runs `f` inside a transaction. Any error rolls the whole batch back.
    pub fn transaction<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Like [`transaction`](Self::transaction), for callers whose closure
    /// carries a richer error type than [`StorageError`].
    pub fn transaction_with<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(StorageError::from)?;
        let result = f(&tx)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Repository accessors
    // ------------------------------------------------------------------

    pub fn words(&self) -> WordRepository {
        WordRepository::new(Arc::clone(&self.conn))
    }

    pub fn review_states(&self) -> ReviewStateRepository {
        ReviewStateRepository::new(Arc::clone(&self.conn))
    }

    pub fn sessions(&self) -> SessionRepository {
        SessionRepository::new(Arc::clone(&self.conn))
    }

    pub fn attempts(&self) -> AttemptRepository {
        AttemptRepository::new(Arc::clone(&self.conn))
    }

    pub fn achievements(&self) -> AchievementRepository {
        AchievementRepository::new(Arc::clone(&self.conn))
    }

    pub fn statistics(&self) -> StatisticsRepository {
        StatisticsRepository::new(Arc::clone(&self.conn))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_storage_is_migrated() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.get_conn().unwrap();
        let version = migrations::get_current_version(&conn).unwrap();
        assert_eq!(version, migrations::CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.get_conn().unwrap();
        let result = conn.execute(
            "INSERT INTO session_word (session_id, word_id, position)
             VALUES ('nope', 'nope', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let storage = Storage::in_memory().unwrap();

        let result: StorageResult<()> = storage.transaction(|conn| {
            models::Word::new("hund", "de").insert(conn)?;
            Err(StorageError::NotFound("word".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = storage
            .get_conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM word", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
