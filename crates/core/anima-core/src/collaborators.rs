//! Interfaces to the collaborators the pipeline drives but does not own
//!
//! LLM-backed formation, vector-store persistence, tool integrations and the
//! output side all live behind these traits. Implementations are handed to
//! components explicitly at construction time.

use crate::types::*;
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, warn};
use uuid::Uuid;

/// Turns a conversation turn into a memory
///
/// `Ok(None)` means the collaborator produced nothing usable and the caller
/// may retry.
#[async_trait]
pub trait MemoryFormation: Send + Sync {
    /// Form (and persist) a memory from a turn
    async fn form_memory(&self, turn: &ConversationTurn) -> Result<Option<MemoryEntry>>;
}

/// Derives opinions from a memory
///
/// An empty vector is treated like a failed attempt.
#[async_trait]
pub trait OpinionFormation: Send + Sync {
    /// Form (and persist) opinions supported by `memory`
    async fn form_opinions(&self, memory: &MemoryEntry) -> Result<Vec<OpinionEntry>>;
}

/// Writes the desire text for an opinion that crossed the creation threshold
#[async_trait]
pub trait DesireFormation: Send + Sync {
    /// Produce a desire for `opinion`; a parse failure is an
    /// [`AnimaError::Formation`](crate::AnimaError::Formation)
    async fn form_desire(&self, opinion: &OpinionEntry, score: f32) -> Result<DesireEntry>;
}

/// Source of value-system weights
#[async_trait]
pub trait ValueProfile: Send + Sync {
    /// Average weight (0 to 100) of the value dimension
    async fn average_for(&self, dimension: &str) -> Result<f32>;
}

/// Desire persistence
#[async_trait]
pub trait DesireStore: Send + Sync {
    /// Persist a new desire
    async fn insert(&self, desire: &DesireEntry) -> Result<()>;

    /// Persist changes to an existing desire
    async fn update(&self, desire: &DesireEntry) -> Result<()>;

    /// Look up a desire
    async fn get(&self, id: Uuid) -> Result<Option<DesireEntry>>;

    /// All desires still in `Pending`
    async fn pending(&self) -> Result<Vec<DesireEntry>>;

    /// Record the opinion → desire back-reference
    async fn link_opinion(&self, opinion_id: Uuid, desire_id: Uuid) -> Result<()>;
}

/// Output side: sounds, lights, status text
#[cfg_attr(test, mockall::automock)]
pub trait FeedbackHandler: Send + Sync {
    /// Render a feedback request
    fn handle_feedback(&self, event: FeedbackEvent) -> Result<()>;
}

/// Executes a named tool for a plan step
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Invoke `tool_name` with resolved parameters and return its raw output
    async fn execute(
        &self,
        tool_name: &str,
        parameters: &BTreeMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value>;
}

/// Delivers reminders and plan results to the user
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    /// Deliver `message` on behalf of `action`
    async fn notify(&self, action: &PlannedActionEntry, message: &str) -> Result<()>;
}

/// Produces the final answer of a multi-step plan from a rendered prompt
#[async_trait]
pub trait ResultSynthesizer: Send + Sync {
    /// Answer the rendered synthesis prompt
    async fn synthesize(&self, prompt: &str) -> Result<String>;
}

/// Planned action persistence
#[async_trait]
pub trait PlannedActionStore: Send + Sync {
    /// Persist the action including its latest run result
    async fn save(&self, action: &PlannedActionEntry) -> Result<()>;
}

/// Handles events taken off a queue by a consumer
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event
    async fn handle(&self, event: Event) -> Result<()>;
}

/// Fire-and-forget front for a [`FeedbackHandler`]
///
/// Errors and panics raised by the handler are logged and dropped.
#[derive(Clone, Default)]
pub struct FeedbackDispatcher {
    handler: Option<Arc<dyn FeedbackHandler>>,
}

impl FeedbackDispatcher {
    /// Dispatcher forwarding to `handler`
    pub fn new(handler: Arc<dyn FeedbackHandler>) -> Self {
        Self {
            handler: Some(handler),
        }
    }

    /// Dispatcher that discards everything
    pub fn disabled() -> Self {
        Self { handler: None }
    }

    /// Send a feedback request
    pub fn emit(&self, event: FeedbackEvent) {
        let Some(handler) = &self.handler else {
            return;
        };
        let kind = event.kind;
        match catch_unwind(AssertUnwindSafe(|| handler.handle_feedback(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(?kind, error = %e, "feedback handler failed"),
            Err(_) => error!(?kind, "feedback handler panicked"),
        }
    }

    /// Send a feedback request of `kind` without detail
    pub fn emit_kind(&self, kind: FeedbackKind) {
        self.emit(FeedbackEvent::new(kind));
    }
}

impl std::fmt::Debug for FeedbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackDispatcher")
            .field("enabled", &self.handler.is_some())
            .finish()
    }
}
