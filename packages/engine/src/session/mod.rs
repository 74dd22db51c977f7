// ============================================================================
// Session module
// ============================================================================

pub mod lifecycle;
pub mod orchestrator;
pub mod recorder;

pub use lifecycle::{SessionLifecycle, SessionPlan, StartOutcome};
pub use orchestrator::{
    CompletionReport, LearningEngine, NextStep, Prompt, SessionProgress, SessionSnapshot,
    SessionStart, SessionSummary, SubmitOutcome, TimeoutOutcome,
};
pub use recorder::{AttemptRecorder, RecordedAttempt};
