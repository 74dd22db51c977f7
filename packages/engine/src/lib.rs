//! # dictee-engine - vocabulary dictation learning engine
//!
//! The full session engine behind the dictee app: it owns the SQLite store
//! and drives everything that happens between "start a session" and the
//! per-day statistics row that session ends up in.
//!
//! - **Sessions** - custom word lists or a spaced-repetition queue, one open
//!   session per user, graded attempts with per-word countdowns
//! - **Scheduling** - SM-2 review state per (user, word), updated from
//!   session results ([`dictee_algo`] does the math)
//! - **Achievements** - a seeded catalog evaluated after every attempt and
//!   completion
//! - **Statistics** - daily aggregates recomputed from completed sessions
//! - **Events** - a broadcast stream of everything the engine does
//!
//! [`session::LearningEngine`] is the front door; the modules below it are
//! usable on their own.
//!
//! ## Modules
//!
//! - [`session`] - orchestrator, lifecycle, and attempt recording
//! - [`review`] - due-word queue and SM-2 state transitions
//! - [`achievements`] - catalog conditions and unlock evaluation
//! - [`stats`] - daily statistics aggregation
//! - [`words`] - language and word-list validation, answer grading
//! - [`audio`] - the `Speaker` seam for word playback
//! - [`storage`] - SQLite repositories, models, and migrations
//! - [`events`] - typed event bus
//! - [`config`] / [`logging`] - environment configuration and tracing setup

pub mod achievements;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod review;
pub mod session;
pub mod stats;
pub mod storage;
pub mod words;

pub use achievements::{AchievementStatus, UnlockedAchievement};
pub use audio::{AudioError, NullSpeaker, Speaker};
pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use events::{EventBus, EventEnvelope, LearningEvent};
pub use review::DueOverview;
pub use session::{
    CompletionReport, LearningEngine, NextStep, Prompt, SessionPlan, SessionProgress,
    SessionSnapshot, SessionStart, SessionSummary, SubmitOutcome, TimeoutOutcome,
};
pub use storage::{Session, SessionMode, Storage, Word};
