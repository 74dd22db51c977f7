// ============================================================================
// Event bus
// ============================================================================
//
// In-process broadcast of learning milestones. Hosts subscribe to drive UI
// updates or sync pipelines; events are fire-and-forget and never affect the
// operation that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::storage::SessionMode;

const CHANNEL_CAPACITY: usize = 1024;

// ============================================================================
// Event types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum LearningEvent {
    #[serde(rename = "SESSION_STARTED")]
    SessionStarted(SessionStartedPayload),

    #[serde(rename = "ATTEMPT_RECORDED")]
    AttemptRecorded(AttemptRecordedPayload),

    #[serde(rename = "SESSION_COMPLETED")]
    SessionCompleted(SessionCompletedPayload),

    #[serde(rename = "ACHIEVEMENT_UNLOCKED")]
    AchievementUnlocked(AchievementUnlockedPayload),
}

impl LearningEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LearningEvent::SessionStarted(_) => "SESSION_STARTED",
            LearningEvent::AttemptRecorded(_) => "ATTEMPT_RECORDED",
            LearningEvent::SessionCompleted(_) => "SESSION_COMPLETED",
            LearningEvent::AchievementUnlocked(_) => "ACHIEVEMENT_UNLOCKED",
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            LearningEvent::SessionStarted(p) => &p.user_id,
            LearningEvent::AttemptRecorded(p) => &p.user_id,
            LearningEvent::SessionCompleted(p) => &p.user_id,
            LearningEvent::AchievementUnlocked(p) => &p.user_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartedPayload {
    pub user_id: String,
    pub session_id: String,
    pub mode: SessionMode,
    pub language: String,
    pub total_words: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecordedPayload {
    pub user_id: String,
    pub session_id: String,
    pub word_id: String,
    pub position: i64,
    pub is_correct: bool,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCompletedPayload {
    pub user_id: String,
    pub session_id: String,
    pub mode: SessionMode,
    pub total_words: i64,
    pub correct_words: i64,
    pub average_response_ms: i64,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementUnlockedPayload {
    pub user_id: String,
    pub code: String,
    pub name: String,
}

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    pub event: LearningEvent,
    pub created_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: LearningEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Bus
// ============================================================================

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Wraps the event in an envelope and broadcasts it. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, event: LearningEvent) {
        let envelope = EventEnvelope::new(event);
        if self.sender.send(envelope).is_err() {
            debug!("event published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> LearningEvent {
        LearningEvent::AttemptRecorded(AttemptRecordedPayload {
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
            word_id: "w1".to_string(),
            position: 0,
            is_correct: true,
            response_time_ms: 1200,
        })
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(sample_event());

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event.event_type(), "ATTEMPT_RECORDED");
        assert_eq!(envelope.event.user_id(), "u1");
        assert!(!envelope.id.is_empty());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(sample_event());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(sample_event()).unwrap();
        assert_eq!(json["type"], "ATTEMPT_RECORDED");
        assert_eq!(json["payload"]["word_id"], "w1");
    }

    #[test]
    fn session_mode_uses_kebab_case_on_the_wire() {
        let event = LearningEvent::SessionStarted(SessionStartedPayload {
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
            mode: SessionMode::SpacedRepetition,
            language: "fr".to_string(),
            total_words: 5,
        });
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["payload"]["mode"], "spaced-repetition");
    }
}
