//! Desires: latent goals derived from opinions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Desire lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DesireStatus {
    /// Created, not yet acted upon
    Pending,
    /// Promoted into an initiative
    Active,
    /// Satisfied (set outside the core)
    Fulfilled,
    /// Dropped (set outside the core)
    Abandoned,
}

impl DesireStatus {
    /// Whether no further transitions are expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, DesireStatus::Fulfilled | DesireStatus::Abandoned)
    }
}

/// A latent goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesireEntry {
    /// Desire id
    pub id: Uuid,
    /// Short label
    pub label: String,
    /// What is wanted
    pub description: String,
    /// Why it is wanted
    pub reasoning: String,
    /// Urgency (0.0 to 1.0)
    pub intensity: f32,
    /// Lifecycle status
    pub status: DesireStatus,
    /// Opinion this desire came from
    pub opinion_id: Uuid,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub last_updated: DateTime<Utc>,
}

impl DesireEntry {
    /// Create a pending desire
    pub fn new(label: impl Into<String>, opinion_id: Uuid, intensity: f32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            description: String::new(),
            reasoning: String::new(),
            intensity: intensity.clamp(0.0, 1.0),
            status: DesireStatus::Pending,
            opinion_id,
            created_at: now,
            last_updated: now,
        }
    }

    /// Set description and reasoning
    pub fn with_description(
        mut self,
        description: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        self.description = description.into();
        self.reasoning = reasoning.into();
        self
    }

    /// Change status and bump the update time
    pub fn transition(&mut self, status: DesireStatus) {
        self.status = status;
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_desire_is_pending() {
        let desire = DesireEntry::new("learn piano", Uuid::new_v4(), 0.6);
        assert_eq!(desire.status, DesireStatus::Pending);
        assert!(!desire.status.is_terminal());
    }

    #[test]
    fn test_transition_updates_timestamp() {
        let mut desire = DesireEntry::new("call mom", Uuid::new_v4(), 0.9);
        let before = desire.last_updated;
        desire.transition(DesireStatus::Active);
        assert_eq!(desire.status, DesireStatus::Active);
        assert!(desire.last_updated >= before);
    }
}
