// ============================================================================
// Configuration
// ============================================================================

use std::env;

pub const DEFAULT_DATABASE_PATH: &str = "dictee.db";
pub const DEFAULT_WORD_TIME_MS: u32 = 10_000;
pub const DEFAULT_DUE_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file. `DICTEE_DATABASE_PATH`.
    pub database_path: String,
    /// Log filter directive. `RUST_LOG`.
    pub log_level: String,
    /// Per-word answer budget in milliseconds. `DICTEE_WORD_TIME_MS`.
    pub word_time_budget_ms: u32,
    /// Default queue size for spaced-repetition sessions. `DICTEE_DUE_LIMIT`.
    pub due_word_limit: usize,
}

impl Config {
    /// Reads configuration from the environment, after loading `.env` if one
    /// is present. Missing or unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let database_path = env::var("DICTEE_DATABASE_PATH")
            .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());
        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let word_time_budget_ms = env::var("DICTEE_WORD_TIME_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_WORD_TIME_MS);
        let due_word_limit = env::var("DICTEE_DUE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DUE_LIMIT);

        Self {
            database_path,
            log_level,
            word_time_budget_ms,
            due_word_limit,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            log_level: "info".to_string(),
            word_time_budget_ms: DEFAULT_WORD_TIME_MS,
            due_word_limit: DEFAULT_DUE_LIMIT,
        }
    }
}
