//! Opinions: evaluative stances derived from memories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A durable evaluative stance on a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionEntry {
    /// Opinion id
    pub id: Uuid,
    /// Subject of the opinion
    pub subject: String,
    /// Negative to positive stance (-1.0 to 1.0)
    pub polarity: f32,
    /// How sure the stance is (0.0 to 1.0)
    pub confidence: f32,
    /// Resistance to change
    pub stability: f32,
    /// Value-system axis the opinion mostly touches
    pub main_dimension: String,
    /// Desire spawned from this opinion (lookup only)
    #[serde(default)]
    pub associated_desire: Option<Uuid>,
    /// Memories supporting the opinion
    #[serde(default)]
    pub associated_memories: BTreeSet<Uuid>,
    /// Short summary
    pub summary: String,
    /// Longer narrative
    #[serde(default)]
    pub narrative: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl OpinionEntry {
    /// Create an opinion with clamped polarity and confidence
    pub fn new(
        subject: impl Into<String>,
        polarity: f32,
        confidence: f32,
        main_dimension: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            polarity: polarity.clamp(-1.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            stability: 0.5,
            main_dimension: main_dimension.into(),
            associated_desire: None,
            associated_memories: BTreeSet::new(),
            summary: String::new(),
            narrative: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a supporting memory
    pub fn with_memory(mut self, memory_id: Uuid) -> Self {
        self.associated_memories.insert(memory_id);
        self
    }

    /// Set the summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Mark an existing desire as spawned from this opinion
    pub fn with_desire(mut self, desire_id: Uuid) -> Self {
        self.associated_desire = Some(desire_id);
        self
    }
}
