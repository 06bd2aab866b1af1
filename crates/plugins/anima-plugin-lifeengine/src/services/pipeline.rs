//! Pipeline Orchestrator
//!
//! Runs one conversation turn through memory formation, opinion formation
//! and desire evaluation. Memory and opinion formation are retried up to
//! the configured budget; desire evaluation runs once per opinion and a
//! failure there only affects that opinion.
//!
//! The orchestrator never enqueues events itself.

use super::desire_engine::{DesireDecision, DesireThresholdEngine};
use crate::session::SessionState;
use crate::types::{MoodArchetype, MoodClassifier};
use anima_core::{
    AnimaError, ConversationTurn, MemoryEntry, MemoryFormation, OpinionEntry, OpinionFormation,
    PipelineConfig, Result,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// How far a turn got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Every memory attempt failed; nothing downstream ran
    MemoryFailed,
    /// A memory was formed but every opinion attempt failed
    OpinionFailed,
    /// Opinions were formed and desire evaluation ran for each
    Completed,
}

/// Desire evaluation failure for one opinion
#[derive(Debug, Clone, PartialEq)]
pub struct DesireFailure {
    /// Opinion whose evaluation failed
    pub opinion_id: Uuid,
    /// Error text
    pub error: String,
}

/// Everything that happened during one turn
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// Session the turn belonged to
    pub session_id: Uuid,
    /// Final outcome
    pub outcome: TurnOutcome,
    /// Memory formation attempts made
    pub memory_attempts: u32,
    /// Opinion formation attempts made
    pub opinion_attempts: u32,
    /// Formed memory, if any
    pub memory: Option<MemoryEntry>,
    /// Formed opinions
    pub opinions: Vec<OpinionEntry>,
    /// Desire decisions, keyed by opinion id, in opinion order
    pub desire_decisions: Vec<(Uuid, DesireDecision)>,
    /// Opinions whose desire evaluation failed
    pub desire_failures: Vec<DesireFailure>,
    /// Mood before the turn
    pub mood_before: MoodArchetype,
    /// Mood after the turn
    pub mood_after: MoodArchetype,
}

impl TurnReport {
    fn new(session: &SessionState, mood_before: MoodArchetype) -> Self {
        Self {
            session_id: session.session_id,
            outcome: TurnOutcome::MemoryFailed,
            memory_attempts: 0,
            opinion_attempts: 0,
            memory: None,
            opinions: Vec::new(),
            desire_decisions: Vec::new(),
            desire_failures: Vec::new(),
            mood_before,
            mood_after: mood_before,
        }
    }

    /// Whether the mood archetype changed during the turn
    pub fn mood_changed(&self) -> bool {
        self.mood_before != self.mood_after
    }
}

/// Memory → opinion → desire orchestrator
pub struct PipelineOrchestrator {
    memory: Arc<dyn MemoryFormation>,
    opinions: Arc<dyn OpinionFormation>,
    desires: Arc<DesireThresholdEngine>,
    classifier: MoodClassifier,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    /// Create an orchestrator over its collaborators
    pub fn new(
        memory: Arc<dyn MemoryFormation>,
        opinions: Arc<dyn OpinionFormation>,
        desires: Arc<DesireThresholdEngine>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            memory,
            opinions,
            desires,
            classifier: MoodClassifier::new(),
            config,
        }
    }

    /// Process one conversation turn for `session`
    ///
    /// Stage failures are reported through [`TurnReport::outcome`]; an `Err`
    /// means the turn was not accepted at all.
    #[instrument(skip(self, session, turn), fields(session_id = %session.session_id))]
    pub async fn run_turn(
        &self,
        session: &mut SessionState,
        turn: ConversationTurn,
    ) -> Result<TurnReport> {
        if turn.session_id != session.session_id {
            return Err(AnimaError::validation(format!(
                "turn for session {} handed to session {}",
                turn.session_id, session.session_id
            )));
        }

        session.record_turn();
        let mut report = TurnReport::new(session, self.classifier.classify(session.affect()));

        // Memorize
        let (memory, attempts) = self
            .with_retries("memory", || async {
                self.memory.form_memory(&turn).await
            })
            .await;
        report.memory_attempts = attempts;
        let Some(memory) = memory else {
            warn!(attempts, "memory formation exhausted its retries, aborting turn");
            return Ok(report);
        };
        debug!(memory_id = %memory.id, satisfaction = memory.satisfaction, "memory formed");

        self.appraise(session, &memory);
        report.mood_after = self.classifier.classify(session.affect());
        if report.mood_changed() {
            info!(from = %report.mood_before, to = %report.mood_after, "mood changed");
        }

        // Form opinions
        let (opinions, attempts) = self
            .with_retries("opinion", || async {
                self.opinions
                    .form_opinions(&memory)
                    .await
                    .map(|ops| if ops.is_empty() { None } else { Some(ops) })
            })
            .await;
        report.opinion_attempts = attempts;
        report.memory = Some(memory);
        let Some(opinions) = opinions else {
            warn!(attempts, "opinion formation exhausted its retries");
            report.outcome = TurnOutcome::OpinionFailed;
            return Ok(report);
        };

        // Desires, one opinion at a time
        for opinion in &opinions {
            match self.desires.evaluate(opinion).await {
                Ok(decision) => report.desire_decisions.push((opinion.id, decision)),
                Err(e) => {
                    warn!(opinion_id = %opinion.id, error = %e, "desire evaluation failed");
                    report.desire_failures.push(DesireFailure {
                        opinion_id: opinion.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.opinions = opinions;
        report.outcome = TurnOutcome::Completed;
        info!(
            opinions = report.opinions.len(),
            desires = report.desire_decisions.len(),
            failures = report.desire_failures.len(),
            "turn processed"
        );
        Ok(report)
    }

    /// Satisfaction above one half lifts pleasure, below it lowers it
    fn appraise(&self, session: &mut SessionState, memory: &MemoryEntry) {
        let delta = (memory.satisfaction - 0.5) * self.config.affect_appraisal_gain;
        session.affect_mut().update(delta, 0.0, 0.0);
    }

    /// Call `attempt` until it yields `Some` or the budget runs out
    ///
    /// `Ok(None)` and `Err` both count as a failed attempt.
    async fn with_retries<T, F, Fut>(&self, stage: &str, mut attempt: F) -> (Option<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let budget = self.config.retry_budget.max(1);
        for n in 1..=budget {
            match attempt().await {
                Ok(Some(value)) => return (Some(value), n),
                Ok(None) => debug!(stage, attempt = n, budget, "stage produced nothing"),
                Err(e) => debug!(stage, attempt = n, budget, error = %e, "stage failed"),
            }
            if n < budget && !self.config.retry_delay().is_zero() {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }
        (None, budget)
    }
}
