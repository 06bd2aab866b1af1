//! Per-session state owned by the conversation context

use crate::types::{AffectState, MoodArchetype, MoodClassifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of one conversation session
///
/// Exclusively owns the session's [`AffectState`]; mood is derived on
/// demand and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Session id, matched against incoming turns
    pub session_id: Uuid,

    affect: AffectState,

    /// Turns processed in this session
    pub turn_count: u64,

    /// Session start time
    pub session_start: DateTime<Utc>,

    /// Last activity timestamp
    pub last_activity: DateTime<Utc>,
}

impl SessionState {
    /// Fresh session at neutral affect
    pub fn new(session_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            affect: AffectState::NEUTRAL,
            turn_count: 0,
            session_start: now,
            last_activity: now,
        }
    }

    /// Start from a given baseline affect
    pub fn with_affect(mut self, affect: AffectState) -> Self {
        self.affect = affect;
        self
    }

    /// Current affect
    pub fn affect(&self) -> &AffectState {
        &self.affect
    }

    /// Mutable affect
    pub fn affect_mut(&mut self) -> &mut AffectState {
        &mut self.affect
    }

    /// Mood derived from the current affect
    pub fn mood(&self) -> MoodArchetype {
        MoodClassifier::new().classify(&self.affect)
    }

    /// Count a turn and refresh the activity time
    pub fn record_turn(&mut self) {
        self.turn_count += 1;
        self.last_activity = Utc::now();
    }
}
