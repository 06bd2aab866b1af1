//! UX feedback requests sent to the output collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of feedback the output side knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackKind {
    /// Processing started
    Start,
    /// Woken after a long idle period
    WakeupLong,
    /// Woken after a short idle period
    WakeupShort,
    /// A long-running task began
    LongtaskStart,
    /// A long-running task finished
    LongtaskEnd,
    /// An initiative began
    InitiativeStart,
    /// An initiative finished
    InitiativeEnd,
    /// Something went wrong
    Failure,
}

/// A feedback request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    /// What to render
    pub kind: FeedbackKind,
    /// Optional detail
    #[serde(default)]
    pub detail: Option<String>,
    /// Request time
    pub emitted_at: DateTime<Utc>,
}

impl FeedbackEvent {
    /// Create a feedback request without detail
    pub fn new(kind: FeedbackKind) -> Self {
        Self {
            kind,
            detail: None,
            emitted_at: Utc::now(),
        }
    }

    /// Attach detail text
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
