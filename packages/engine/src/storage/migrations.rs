// ============================================================================
// Schema migrations
// ============================================================================
//
// Migrations are applied in version order inside their own transaction, and
// recorded in `schema_migrations` so that reopening an existing database only
// applies what is missing. Every statement is written to be idempotent
// (IF NOT EXISTS / INSERT OR IGNORE) as a second line of defence.

use rusqlite::Connection;
use tracing::info;

use super::{StorageError, StorageResult};

/// Version the engine expects after all migrations ran.
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Base schema, applied as migration v1.
pub const INIT_SCHEMA: &str = include_str!("schema.sql");

const QUERY_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_review_state_due
    ON review_state(user_id, next_review_at, interval_days);

CREATE INDEX IF NOT EXISTS idx_session_user_open
    ON session(user_id, completed);

CREATE INDEX IF NOT EXISTS idx_session_user_started
    ON session(user_id, started_at);

CREATE INDEX IF NOT EXISTS idx_session_user_ended
    ON session(user_id, completed, ended_at);

CREATE INDEX IF NOT EXISTS idx_attempt_user_created
    ON attempt(user_id, created_at);

CREATE INDEX IF NOT EXISTS idx_attempt_user_correct
    ON attempt(user_id, is_correct, word_id);
"#;

const ACHIEVEMENT_CATALOG: &str = r#"
INSERT OR IGNORE INTO achievement (id, code, name, description, condition, parent_code, sort_order) VALUES
    ('7b0c1a7e-9d24-4b6f-8f3a-2e1d5c9b4a01', 'first_word', 'First Word',
     'Record your first dictation attempt.',
     '{"type":"first_word"}', NULL, 0),
    ('3f8e2b91-6c45-4d0a-9b7e-815f2a6c3d02', 'fast_response', 'Quick Ear',
     'Answer a word correctly in under five seconds.',
     '{"type":"fast_response","max_ms":5000}', NULL, 1),
    ('a94d7c28-1e5b-4f9c-8a6d-4b3e9f1c2a03', 'perfect_score', 'Flawless Run',
     'Finish a session of ten or more words without a single mistake.',
     '{"type":"perfect_score","min_words":10}', NULL, 2),
    ('5c2f8e04-7a91-42d6-b3c8-6e4a1d9f5b04', 'perfect_streak', 'Hot Streak',
     'Get ten correct answers in a row.',
     '{"type":"perfect_streak","window":10}', NULL, 3),
    ('e17a3d59-2f8c-49b1-a5e7-9c6b4d2f8e05', 'words_mastered', 'Word Collector',
     'Answer ten distinct words correctly.',
     '{"type":"words_mastered","threshold":10}', NULL, 4),
    ('8d4b9f26-3a7e-41c5-b9f2-1e8c5a3d7b06', 'words_mastered_1', 'Word Collector I',
     'Answer 10 distinct words correctly.',
     '{"type":"words_mastered","threshold":10,"tier":1}', 'words_mastered', 5),
    ('2e9c5a73-8b1f-46d9-a4c3-7f2e9b5d1c07', 'words_mastered_2', 'Word Collector II',
     'Answer 25 distinct words correctly.',
     '{"type":"words_mastered","threshold":25,"tier":2}', 'words_mastered', 6),
    ('6a1f4d98-5c2b-43e7-8d1a-3b9f6e4c2a08', 'words_mastered_3', 'Word Collector III',
     'Answer 50 distinct words correctly.',
     '{"type":"words_mastered","threshold":50,"tier":3}', 'words_mastered', 7),
    ('c58e2b47-9f6a-4d13-b7e5-8a4c1f9d6e09', 'words_mastered_4', 'Word Collector IV',
     'Answer 100 distinct words correctly.',
     '{"type":"words_mastered","threshold":100,"tier":4}', 'words_mastered', 8),
    ('1f7d9c35-4e8b-40a2-9c6f-5d3a8b7e4f10', 'words_mastered_5', 'Word Collector V',
     'Answer 250 distinct words correctly.',
     '{"type":"words_mastered","threshold":250,"tier":5}', 'words_mastered', 9);
"#;

/// A single schema migration step.
pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub sql: &'static str,
}

pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "init_schema",
            sql: INIT_SCHEMA,
        },
        Migration {
            version: 2,
            name: "query_indexes",
            sql: QUERY_INDEXES,
        },
        Migration {
            version: 3,
            name: "achievement_catalog",
            sql: ACHIEVEMENT_CATALOG,
        },
    ]
}

/// Applies all pending migrations to the connection.
pub fn run_migrations(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current = get_current_version(conn)?;
    for migration in get_migrations() {
        if migration.version <= current {
            continue;
        }
        apply_migration(conn, &migration)?;
    }
    Ok(())
}

pub fn get_current_version(conn: &Connection) -> StorageResult<i32> {
    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version.unwrap_or(0))
}

fn apply_migration(conn: &Connection, migration: &Migration) -> StorageResult<()> {
    info!(
        version = migration.version,
        name = migration.name,
        "applying schema migration"
    );

    conn.execute_batch("BEGIN IMMEDIATE")?;
    match conn.execute_batch(migration.sql) {
        Ok(()) => {
            conn.execute(
                "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                rusqlite::params![migration.version, migration.name],
            )?;
            conn.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK")?;
            Err(StorageError::Migration(format!(
                "migration v{} ({}) failed: {}",
                migration.version, migration.name, e
            )))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
