// ============================================================================
// Learning engine orchestrator
// ============================================================================
//
// Front door of the crate. Holds the per-user in-flight run (cursor, pause
// flag, countdown arming) in memory and drives lifecycle, recording, review
// scheduling, achievements, statistics and events behind one API. Every
// mutation is persisted before it is visible here, so a process restart
// loses nothing but the pause flag.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::achievements::{AchievementEvaluator, AchievementStatus, UnlockedAchievement};
use crate::audio::Speaker;
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::events::{
    AchievementUnlockedPayload, AttemptRecordedPayload, EventBus, EventEnvelope, LearningEvent,
    SessionCompletedPayload, SessionStartedPayload,
};
use crate::review::{DueOverview, ReviewScheduler};
use crate::session::lifecycle::{SessionLifecycle, SessionPlan, StartOutcome};
use crate::session::recorder::AttemptRecorder;
use crate::stats::StatisticsAggregator;
use crate::storage::{Session, SessionMode, Storage, UserStatistics, Word};
use crate::words;

// ============================================================================
// Public result types
// ============================================================================

/// What the caller gets when a session starts.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub mode: SessionMode,
    pub language: String,
    pub total_words: i64,
    /// Index of the next word to present.
    pub position: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub enum SessionStart {
    Started(SessionSnapshot),
    /// Spaced-repetition start with an empty queue; no session was created.
    NothingDue,
}

/// One presented word. The answer countdown is armed the moment this is
/// returned; the word text itself is deliberately absent since the user must
/// spell what they heard.
#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    pub session_id: String,
    pub position: usize,
    pub total_words: i64,
    pub language: String,
    pub time_budget_ms: u32,
    /// Set when playback failed; the countdown still runs.
    pub audio_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub mode: SessionMode,
    pub language: String,
    pub total_words: i64,
    pub attempts_recorded: i64,
    pub correct_words: i64,
    pub average_response_ms: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

/// Summary plus whatever the completion unlocked.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    pub summary: SessionSummary,
    pub unlocked: Vec<UnlockedAchievement>,
}

#[derive(Debug, Clone, Serialize)]
pub enum NextStep {
    NextWord { position: usize },
    Completed(CompletionReport),
}

/// Feedback for one submitted answer.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub session_id: String,
    /// Canonical expected word, revealed after the answer.
    pub word: String,
    pub is_correct: bool,
    pub response_time_ms: u32,
    pub correct_words: i64,
    pub average_response_ms: i64,
    /// Attempt-level achievements unlocked by this answer.
    pub unlocked: Vec<UnlockedAchievement>,
    pub next: NextStep,
}

#[derive(Debug, Clone, Serialize)]
pub enum TimeoutOutcome {
    /// The expiry was current; an incorrect empty attempt was recorded.
    Recorded(SubmitOutcome),
    /// Expiry arrived while paused; nothing was recorded.
    SuppressedPaused,
    /// Expiry arrived for a word that was already answered or never armed.
    SuppressedStale,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionProgress {
    pub session_id: String,
    pub mode: SessionMode,
    pub language: String,
    pub position: usize,
    pub total_words: i64,
    pub correct_words: i64,
    pub average_response_ms: i64,
    pub paused: bool,
    pub started_at: DateTime<Utc>,
}

// ============================================================================
// Active run
// ============================================================================

/// In-memory state of the session currently being driven. Everything except
/// `paused` and `armed_at` is a cache of persisted rows.
struct ActiveRun {
    session: Session,
    words: Vec<Word>,
    /// Index of the next unanswered word; always equals recorded attempts.
    cursor: usize,
    paused: bool,
    /// Set while a presented word's countdown is live.
    armed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Engine
// ============================================================================

pub struct LearningEngine {
    config: Config,
    storage: Arc<Storage>,
    speaker: Arc<dyn Speaker>,
    events: EventBus,
    lifecycle: SessionLifecycle,
    recorder: AttemptRecorder,
    scheduler: ReviewScheduler,
    evaluator: AchievementEvaluator,
    statistics: StatisticsAggregator,
    runs: RwLock<HashMap<String, Arc<Mutex<ActiveRun>>>>,
}

impl LearningEngine {
    /// Opens the configured database and assembles the engine.
    pub fn new(config: Config, speaker: Arc<dyn Speaker>) -> EngineResult<Self> {
        let storage = Arc::new(Storage::open(&config.database_path)?);
        Ok(Self::with_storage(storage, speaker, config))
    }

    /// Assembles the engine around an already-open storage handle.
    pub fn with_storage(storage: Arc<Storage>, speaker: Arc<dyn Speaker>, config: Config) -> Self {
        Self {
            lifecycle: SessionLifecycle::new(Arc::clone(&storage), config.due_word_limit),
            recorder: AttemptRecorder::new(Arc::clone(&storage)),
            scheduler: ReviewScheduler::new(Arc::clone(&storage)),
            evaluator: AchievementEvaluator::new(Arc::clone(&storage)),
            statistics: StatisticsAggregator::new(Arc::clone(&storage)),
            events: EventBus::new(),
            config,
            storage,
            speaker,
            runs: RwLock::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribes to the engine's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Session control
    // ------------------------------------------------------------------

    /// Starts a session for the user, implicitly completing (and fully
    /// finalizing) any session still open. A request that fails validation
    /// leaves the open session untouched.
    pub async fn start_session(
        &self,
        user_id: &str,
        language: &str,
        plan: SessionPlan,
    ) -> EngineResult<SessionStart> {
        // A rejected start must leave any open session untouched, so the
        // request is validated before the implicit close below.
        self.lifecycle.validate(language, &plan)?;

        // Close and finalize the stale session before selecting words, so a
        // spaced-repetition start sees schedules that include it.
        let stale = self.lifecycle.close_open(user_id)?;
        for session in &stale {
            info!(session_id = %session.id, user_id, "implicitly completed open session");
            self.finalize_completed(session)?;
        }
        self.runs.write().await.remove(user_id);

        match self.lifecycle.start(user_id, language, plan)? {
            StartOutcome::NothingDue => {
                debug!(user_id, language, "review queue empty; no session started");
                Ok(SessionStart::NothingDue)
            }
            StartOutcome::Started {
                session,
                words,
                closed,
            } => {
                // The pre-close above normally leaves nothing here.
                for late in &closed {
                    warn!(session_id = %late.id, "session closed during start");
                    self.finalize_completed(late)?;
                }

                let snapshot = SessionSnapshot {
                    session_id: session.id.clone(),
                    mode: session.mode,
                    language: session.language.clone(),
                    total_words: session.total_words,
                    position: 0,
                    started_at: session.started_at,
                };
                self.events
                    .publish(LearningEvent::SessionStarted(SessionStartedPayload {
                        user_id: user_id.to_string(),
                        session_id: session.id.clone(),
                        mode: session.mode,
                        language: session.language.clone(),
                        total_words: session.total_words,
                    }));

                let run = ActiveRun {
                    session,
                    words,
                    cursor: 0,
                    paused: false,
                    armed_at: None,
                };
                self.runs
                    .write()
                    .await
                    .insert(user_id.to_string(), Arc::new(Mutex::new(run)));

                Ok(SessionStart::Started(snapshot))
            }
        }
    }

    /// Plays the current word and arms its countdown. The countdown is armed
    /// only once playback resolves; a playback failure still arms it and is
    /// reported in the prompt instead of wedging the session.
    pub async fn present_current_word(&self, user_id: &str) -> EngineResult<Prompt> {
        let handle = self.run_handle(user_id).await?;

        let (session_id, language, text, position, total_words) = {
            let run = handle.lock().await;
            if run.paused {
                return Err(EngineError::conflict("session is paused"));
            }
            if run.cursor >= run.words.len() {
                return Err(EngineError::conflict("session has no remaining words"));
            }
            let word = &run.words[run.cursor];
            (
                run.session.id.clone(),
                run.session.language.clone(),
                word.text.clone(),
                run.cursor,
                run.session.total_words,
            )
        };

        // Speak without holding the run lock so pause() stays responsive
        // during playback.
        let audio_error = match self.speaker.speak(&text, &language).await {
            Ok(()) => None,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "word playback failed");
                Some(e.to_string())
            }
        };

        let mut run = handle.lock().await;
        if run.paused {
            return Err(EngineError::conflict("session is paused"));
        }
        if run.session.id != session_id || run.cursor != position {
            return Err(EngineError::conflict("session advanced during playback"));
        }
        run.armed_at = Some(Utc::now());

        Ok(Prompt {
            session_id,
            position,
            total_words,
            language,
            time_budget_ms: self.config.word_time_budget_ms,
            audio_error,
        })
    }

    /// Grades and records the answer for the current word, advancing the
    /// session and, on the final word, completing it.
    pub async fn submit_answer(
        &self,
        user_id: &str,
        user_input: &str,
        response_time_ms: u32,
    ) -> EngineResult<SubmitOutcome> {
        let handle = self.run_handle(user_id).await?;
        let mut run = handle.lock().await;
        self.submit_locked(user_id, &mut run, user_input, response_time_ms)
            .await
    }

    async fn submit_locked(
        &self,
        user_id: &str,
        run: &mut ActiveRun,
        user_input: &str,
        response_time_ms: u32,
    ) -> EngineResult<SubmitOutcome> {
        if run.paused {
            return Err(EngineError::conflict("session is paused"));
        }
        if run.cursor >= run.words.len() {
            return Err(EngineError::conflict("session has no remaining words"));
        }
        let word = run.words[run.cursor].clone();

        let recorded = self
            .recorder
            .record(&run.session.id, &word, user_input, response_time_ms)?;

        run.session = recorded.session.clone();
        run.cursor = recorded.attempts_recorded as usize;
        run.armed_at = None;

        self.events
            .publish(LearningEvent::AttemptRecorded(AttemptRecordedPayload {
                user_id: user_id.to_string(),
                session_id: recorded.session.id.clone(),
                word_id: word.id.clone(),
                position: recorded.attempts_recorded - 1,
                is_correct: recorded.attempt.is_correct,
                response_time_ms: u64::from(response_time_ms),
            }));
        let unlocked = self.evaluator.after_attempt(&recorded.attempt)?;
        self.publish_unlocks(user_id, &unlocked);

        let next = if recorded.completed_now {
            let completion_unlocked = self.finalize_completed(&recorded.session)?;
            self.runs.write().await.remove(user_id);
            NextStep::Completed(CompletionReport {
                summary: self.summarize(&recorded.session)?,
                unlocked: completion_unlocked,
            })
        } else {
            NextStep::NextWord {
                position: run.cursor,
            }
        };

        Ok(SubmitOutcome {
            session_id: recorded.session.id.clone(),
            word: word.text,
            is_correct: recorded.attempt.is_correct,
            response_time_ms,
            correct_words: recorded.session.correct_words,
            average_response_ms: recorded.session.average_response_ms,
            unlocked,
            next,
        })
    }

    /// Handles a countdown expiry: records an incorrect empty attempt for
    /// the current word, unless the expiry is stale or the session paused.
    pub async fn timeout_current_word(&self, user_id: &str) -> EngineResult<TimeoutOutcome> {
        let handle = self.run_handle(user_id).await?;
        let mut run = handle.lock().await;

        if run.paused {
            debug!(user_id, "countdown expiry ignored while paused");
            return Ok(TimeoutOutcome::SuppressedPaused);
        }
        if run.armed_at.is_none() {
            debug!(user_id, "stale countdown expiry ignored");
            return Ok(TimeoutOutcome::SuppressedStale);
        }

        let budget = self.config.word_time_budget_ms;
        let outcome = self.submit_locked(user_id, &mut run, "", budget).await?;
        Ok(TimeoutOutcome::Recorded(outcome))
    }

    /// Pauses the run: stops playback, disarms the countdown and blocks
    /// submissions until `resume`. Resuming re-presents the current word
    /// with a fresh budget.
    pub async fn pause(&self, user_id: &str) -> EngineResult<()> {
        let handle = self.run_handle(user_id).await?;
        let mut run = handle.lock().await;
        if !run.paused {
            run.paused = true;
            run.armed_at = None;
            self.speaker.stop();
            debug!(user_id, session_id = %run.session.id, "session paused");
        }
        Ok(())
    }

    pub async fn resume(&self, user_id: &str) -> EngineResult<()> {
        let handle = self.run_handle(user_id).await?;
        let mut run = handle.lock().await;
        if run.paused {
            run.paused = false;
            debug!(user_id, session_id = %run.session.id, "session resumed");
        }
        Ok(())
    }

    /// Completes the open session now. Recorded attempts keep counting
    /// toward aggregates, reviews and achievements.
    pub async fn end_session_early(&self, user_id: &str) -> EngineResult<CompletionReport> {
        let handle = {
            let map = self.runs.read().await;
            map.get(user_id).cloned()
        };
        // Hold the run lock through teardown so no submit races the close.
        let guard = match &handle {
            Some(h) => Some(h.lock().await),
            None => None,
        };

        let session = self.lifecycle.end_early(user_id)?;
        let unlocked = self.finalize_completed(&session)?;

        drop(guard);
        self.runs.write().await.remove(user_id);

        Ok(CompletionReport {
            summary: self.summarize(&session)?,
            unlocked,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Progress of the open session, if any. Prefers live run state (which
    /// knows about pausing) and falls back to storage after a restart.
    pub async fn session_progress(&self, user_id: &str) -> EngineResult<Option<SessionProgress>> {
        // Clone the handle out so the map guard is released before the run
        // lock is taken; submit paths acquire these in the opposite order.
        let cached = {
            let map = self.runs.read().await;
            map.get(user_id).cloned()
        };
        if let Some(handle) = cached {
            let run = handle.lock().await;
            return Ok(Some(SessionProgress {
                session_id: run.session.id.clone(),
                mode: run.session.mode,
                language: run.session.language.clone(),
                position: run.cursor,
                total_words: run.session.total_words,
                correct_words: run.session.correct_words,
                average_response_ms: run.session.average_response_ms,
                paused: run.paused,
                started_at: run.session.started_at,
            }));
        }

        match self.lifecycle.open_run(user_id)? {
            Some((session, _words, recorded)) => Ok(Some(SessionProgress {
                session_id: session.id.clone(),
                mode: session.mode,
                language: session.language.clone(),
                position: recorded as usize,
                total_words: session.total_words,
                correct_words: session.correct_words,
                average_response_ms: session.average_response_ms,
                paused: false,
                started_at: session.started_at,
            })),
            None => Ok(None),
        }
    }

    /// Most recent sessions first.
    pub fn session_history(&self, user_id: &str, limit: usize) -> EngineResult<Vec<SessionSummary>> {
        let sessions = self.storage.sessions().history(user_id, limit)?;
        sessions.iter().map(|s| self.summarize(s)).collect()
    }

    /// Full achievement catalog with the user's unlock timestamps.
    pub fn achievement_overview(&self, user_id: &str) -> EngineResult<Vec<AchievementStatus>> {
        self.evaluator.overview(user_id)
    }

    /// Daily aggregates in [from, to], oldest first.
    pub fn daily_statistics(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<UserStatistics>> {
        self.statistics.daily_range(user_id, from, to)
    }

    /// State of the user's review queue for one language.
    pub fn due_overview(&self, user_id: &str, language: &str) -> EngineResult<DueOverview> {
        words::validate_language(language)?;
        self.scheduler.due_overview(user_id, language)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// The live run for the user, rebuilt from storage when the engine was
    /// restarted while a session was open.
    async fn run_handle(&self, user_id: &str) -> EngineResult<Arc<Mutex<ActiveRun>>> {
        let cached = {
            let map = self.runs.read().await;
            map.get(user_id).cloned()
        };
        if let Some(handle) = cached {
            return Ok(handle);
        }

        match self.lifecycle.open_run(user_id)? {
            Some((session, words, recorded)) => {
                info!(session_id = %session.id, user_id, "restored open session");
                let run = ActiveRun {
                    cursor: recorded as usize,
                    session,
                    words,
                    paused: false,
                    armed_at: None,
                };
                let mut map = self.runs.write().await;
                let entry = map
                    .entry(user_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(run)));
                Ok(Arc::clone(entry))
            }
            None => Err(EngineError::not_found("active session")),
        }
    }

    /// Post-completion pipeline, run exactly once per completed session:
    /// reviews (spaced mode), completion achievements, the day's statistics
    /// and the completion events.
    fn finalize_completed(&self, session: &Session) -> EngineResult<Vec<UnlockedAchievement>> {
        if session.mode == SessionMode::SpacedRepetition {
            let attempts = self.storage.attempts().list_for_session(&session.id)?;
            self.scheduler
                .apply_session_reviews(&session.user_id, &attempts)?;
        }

        let unlocked = self.evaluator.after_completion(session)?;
        self.publish_unlocks(&session.user_id, &unlocked);

        let ended_at = session.ended_at.unwrap_or_else(Utc::now);
        self.statistics.refresh_for_day(&session.user_id, ended_at)?;

        self.events
            .publish(LearningEvent::SessionCompleted(SessionCompletedPayload {
                user_id: session.user_id.clone(),
                session_id: session.id.clone(),
                mode: session.mode,
                total_words: session.total_words,
                correct_words: session.correct_words,
                average_response_ms: session.average_response_ms,
                ended_at,
            }));
        info!(
            session_id = %session.id,
            correct = session.correct_words,
            total = session.total_words,
            "session completed"
        );
        Ok(unlocked)
    }

    fn publish_unlocks(&self, user_id: &str, unlocked: &[UnlockedAchievement]) {
        for achievement in unlocked {
            self.events.publish(LearningEvent::AchievementUnlocked(
                AchievementUnlockedPayload {
                    user_id: user_id.to_string(),
                    code: achievement.code.clone(),
                    name: achievement.name.clone(),
                },
            ));
        }
    }

    fn summarize(&self, session: &Session) -> EngineResult<SessionSummary> {
        let (attempts_recorded, _, _) = self.storage.attempts().session_totals(&session.id)?;
        Ok(SessionSummary {
            session_id: session.id.clone(),
            mode: session.mode,
            language: session.language.clone(),
            total_words: session.total_words,
            attempts_recorded,
            correct_words: session.correct_words,
            average_response_ms: session.average_response_ms,
            started_at: session.started_at,
            ended_at: session.ended_at,
            completed: session.completed,
        })
    }
}
