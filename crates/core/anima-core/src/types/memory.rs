//! Conversation turns and the memories formed from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One inbound conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Session the turn belongs to
    pub session_id: Uuid,
    /// Who spoke
    pub speaker: String,
    /// Raw turn text
    pub text: String,
    /// Arrival time
    pub received_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a turn received now
    pub fn new(session_id: Uuid, speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            session_id,
            speaker: speaker.into(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// A memory formed from a conversation turn; read-only once persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Memory id
    pub id: Uuid,
    /// Condensed content
    pub content: String,
    /// What the memory is about
    pub subject: String,
    /// How satisfying the exchange was (0.0 to 1.0)
    pub satisfaction: f32,
    /// Embedding, owned by the persistence layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Formation time
    pub timestamp: DateTime<Utc>,
}

impl MemoryEntry {
    /// Create a memory with a clamped satisfaction
    pub fn new(content: impl Into<String>, subject: impl Into<String>, satisfaction: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            subject: subject.into(),
            satisfaction: satisfaction.clamp(0.0, 1.0),
            embedding: None,
            timestamp: Utc::now(),
        }
    }
}
