// ============================================================================
// Audio playback seam
// ============================================================================
//
// The engine never talks to a TTS stack directly; hosts hand it a `Speaker`.
// `speak` resolves when playback has started (or failed), which is the signal
// the orchestrator uses to arm the per-word countdown.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("speech synthesis not supported on this platform")]
    NotSupported,

    #[error("language not supported for speech: {0}")]
    LanguageNotSupported(String),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("playback cancelled")]
    Cancelled,
}

#[async_trait]
pub trait Speaker: Send + Sync {
    /// Speaks one word aloud. Resolves once playback has started.
    async fn speak(&self, text: &str, language: &str) -> Result<(), AudioError>;

    /// Stops any in-flight playback. Must be safe to call at any time.
    fn stop(&self);
}

/// Speaker that plays nothing. Used in tests and headless environments.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSpeaker;

#[async_trait]
impl Speaker for NullSpeaker {
    async fn speak(&self, _text: &str, _language: &str) -> Result<(), AudioError> {
        Ok(())
    }

    fn stop(&self) {}
}
