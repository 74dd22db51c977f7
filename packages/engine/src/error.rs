// ============================================================================
// Engine error type
// ============================================================================

use thiserror::Error;

use crate::storage::StorageError;
use dictee_algo::Sm2Error;

/// Error surface of the public engine API.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Caller supplied unusable input (bad language, malformed word list, ...).
    #[error("{0}")]
    Validation(String),

    /// An answer for this word was already recorded in the session.
    #[error("attempt already recorded for word {word_id}")]
    DuplicateAttempt { word_id: String },

    #[error("{0} not found")]
    NotFound(String),

    /// The operation is valid in general but not in the session's current
    /// state (paused, already completed, ...).
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Schedule(#[from] Sm2Error),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        EngineError::NotFound(what.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        EngineError::Conflict(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_convert() {
        let err: EngineError = StorageError::NotFound("word".to_string()).into();
        assert!(matches!(err, EngineError::Storage(_)));
        assert_eq!(err.to_string(), "word not found");
    }

    #[test]
    fn duplicate_attempt_names_the_word() {
        let err = EngineError::DuplicateAttempt {
            word_id: "w-42".to_string(),
        };
        assert!(err.to_string().contains("w-42"));
    }
}
