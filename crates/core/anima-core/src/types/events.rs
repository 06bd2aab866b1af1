//! Event types for the event queues

use super::{ConversationTurn, DesireEntry, FeedbackEvent, MemoryEntry, OpinionEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type enum
///
/// Each type carries an explicit numeric priority rank; queues order on the
/// rank alone, so new types only need a rank here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Stop request for consumers
    Shutdown,
    /// Inbound conversation turn
    ConversationTurn,
    /// A pending desire crossed the initiative threshold
    Initiative,
    /// A planned action fired
    ScheduledAction,
    /// Memory formed from a turn
    MemoryFormed,
    /// Opinion formed from a memory
    OpinionFormed,
    /// Desire created or reinforced
    DesireFormed,
    /// Session mood changed archetype
    MoodChanged,
    /// UX feedback request
    Feedback,
}

impl EventType {
    /// Priority rank, lower ranks are served first
    pub const fn priority(&self) -> u8 {
        match self {
            EventType::Shutdown => 0,
            EventType::ConversationTurn => 10,
            EventType::Initiative => 20,
            EventType::ScheduledAction => 30,
            EventType::MemoryFormed | EventType::OpinionFormed | EventType::DesireFormed => 40,
            EventType::MoodChanged => 50,
            EventType::Feedback => 60,
        }
    }

    /// Storage tag (the serde name)
    pub fn as_tag(&self) -> &'static str {
        match self {
            EventType::Shutdown => "SHUTDOWN",
            EventType::ConversationTurn => "CONVERSATION_TURN",
            EventType::Initiative => "INITIATIVE",
            EventType::ScheduledAction => "SCHEDULED_ACTION",
            EventType::MemoryFormed => "MEMORY_FORMED",
            EventType::OpinionFormed => "OPINION_FORMED",
            EventType::DesireFormed => "DESIRE_FORMED",
            EventType::MoodChanged => "MOOD_CHANGED",
            EventType::Feedback => "FEEDBACK",
        }
    }

    /// Resolve a storage tag back into a type
    pub fn from_tag(tag: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(tag.to_string())).ok()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Mood change payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodPayload {
    /// Session the mood belongs to
    pub session_id: Uuid,
    /// Archetype name before the change
    pub previous: String,
    /// Archetype name after the change
    pub current: String,
}

/// Event payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// No payload
    Empty,
    /// Conversation turn
    Conversation(ConversationTurn),
    /// Formed memory
    Memory(MemoryEntry),
    /// Formed opinion
    Opinion(OpinionEntry),
    /// Desire (initiatives carry the promoted desire)
    Desire(DesireEntry),
    /// Planned action reference
    PlannedAction {
        /// Action id
        action_id: Uuid,
        /// Action label
        label: String,
    },
    /// Mood change
    Mood(MoodPayload),
    /// Feedback request
    Feedback(FeedbackEvent),
    /// Anything else
    Custom(serde_json::Value),
}

/// An immutable, prioritized event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    event_type: EventType,
    payload: EventPayload,
    source: String,
    created_at: DateTime<Utc>,
}

impl Event {
    /// Create a new event stamped with the current time
    pub fn new(event_type: EventType, payload: EventPayload, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            payload,
            source: source.into(),
            created_at: Utc::now(),
        }
    }

    /// Rebuild an event from its stored parts
    pub fn from_parts(
        id: Uuid,
        event_type: EventType,
        payload: EventPayload,
        source: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_type,
            payload,
            source: source.into(),
            created_at,
        }
    }

    /// Initiative event carrying a desire
    pub fn initiative(desire: DesireEntry, source: impl Into<String>) -> Self {
        Self::new(EventType::Initiative, EventPayload::Desire(desire), source)
    }

    /// Event id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Event type
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Priority rank of the event type
    pub fn priority(&self) -> u8 {
        self.event_type.priority()
    }

    /// Payload
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Consume the event, keeping only its payload
    pub fn into_payload(self) -> EventPayload {
        self.payload
    }

    /// Producer name
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ranks_are_ordered() {
        assert!(EventType::Shutdown.priority() < EventType::ConversationTurn.priority());
        assert!(EventType::ConversationTurn.priority() < EventType::Initiative.priority());
        assert!(EventType::Initiative.priority() < EventType::Feedback.priority());
    }

    #[test]
    fn test_tag_resolution() {
        for ty in [
            EventType::Initiative,
            EventType::ScheduledAction,
            EventType::MoodChanged,
        ] {
            assert_eq!(EventType::from_tag(ty.as_tag()), Some(ty));
        }
        assert_eq!(EventType::from_tag("TELEPORT"), None);
    }

    #[test]
    fn test_payload_tagging() {
        let payload = EventPayload::Custom(serde_json::json!({"x": 1}));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "custom");
        assert_eq!(json["data"]["x"], 1);
    }
}
