//! Desire Threshold Engine
//!
//! Decides, per opinion, whether a desire should be created, an existing
//! one reinforced, or nothing done.

use anima_core::{
    AnimaError, DesireConfig, DesireEntry, DesireFormation, DesireStatus, DesireStore,
    OpinionEntry, Result, ValueProfile,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What `evaluate` did for one opinion
#[derive(Debug, Clone, PartialEq)]
pub enum DesireDecision {
    /// A new pending desire was formed and linked to the opinion
    Created(DesireEntry),
    /// The opinion's existing desire had its intensity reinforced
    Updated(DesireEntry),
    /// The opinion's desire is already fulfilled or abandoned; left alone
    Settled(DesireEntry),
    /// No desire and the candidacy score fell short
    BelowThreshold {
        /// Candidacy score that was computed
        score: f32,
    },
}

impl DesireDecision {
    /// The desire touched by this decision, if any
    pub fn desire(&self) -> Option<&DesireEntry> {
        match self {
            DesireDecision::Created(d) | DesireDecision::Updated(d) | DesireDecision::Settled(d) => {
                Some(d)
            }
            DesireDecision::BelowThreshold { .. } => None,
        }
    }
}

/// Threshold-gated desire creation and reinforcement
pub struct DesireThresholdEngine {
    formation: Arc<dyn DesireFormation>,
    values: Arc<dyn ValueProfile>,
    store: Arc<dyn DesireStore>,
    config: DesireConfig,
}

impl DesireThresholdEngine {
    /// Create an engine over its collaborators
    pub fn new(
        formation: Arc<dyn DesireFormation>,
        values: Arc<dyn ValueProfile>,
        store: Arc<dyn DesireStore>,
        config: DesireConfig,
    ) -> Self {
        Self {
            formation,
            values,
            store,
            config,
        }
    }

    /// Candidacy score: `|polarity| * polarity * (average / 100)`
    ///
    /// Strong stances dominate, the sign of the polarity is kept, and the
    /// value-system average (0 to 100) scales the result.
    pub fn score_candidacy(polarity: f32, value_profile_average: f32) -> f32 {
        polarity.abs() * polarity * (value_profile_average / 100.0)
    }

    /// Creation threshold in use
    pub fn creation_threshold(&self) -> f32 {
        self.config.creation_threshold
    }

    /// Decide and apply the desire outcome for one opinion
    pub async fn evaluate(&self, opinion: &OpinionEntry) -> Result<DesireDecision> {
        let average = self.values.average_for(&opinion.main_dimension).await?;
        let score = Self::score_candidacy(opinion.polarity, average);
        debug!(
            opinion_id = %opinion.id,
            dimension = %opinion.main_dimension,
            average,
            score,
            "scored opinion for desire candidacy"
        );

        if let Some(desire) = self.linked_desire(opinion).await? {
            return self.reinforce(desire, score).await;
        }
        if let Some(desire_id) = opinion.associated_desire {
            warn!(
                opinion_id = %opinion.id,
                %desire_id,
                "opinion links a missing desire, treating as unlinked"
            );
        }

        if score < self.config.creation_threshold {
            return Ok(DesireDecision::BelowThreshold { score });
        }

        self.create(opinion, score).await
    }

    async fn create(&self, opinion: &OpinionEntry, score: f32) -> Result<DesireDecision> {
        let mut desire = self.formation.form_desire(opinion, score).await?;
        if desire.label.trim().is_empty() {
            return Err(AnimaError::formation(format!(
                "desire formed for opinion {} has no label",
                opinion.id
            )));
        }

        let now = Utc::now();
        desire.status = DesireStatus::Pending;
        desire.opinion_id = opinion.id;
        desire.intensity = desire.intensity.clamp(0.0, 1.0);
        desire.created_at = now;
        desire.last_updated = now;

        self.store.insert(&desire).await?;
        self.store.link_opinion(opinion.id, desire.id).await?;

        info!(
            desire_id = %desire.id,
            opinion_id = %opinion.id,
            label = %desire.label,
            intensity = desire.intensity,
            "desire created"
        );
        Ok(DesireDecision::Created(desire))
    }

    async fn reinforce(&self, mut desire: DesireEntry, score: f32) -> Result<DesireDecision> {
        if desire.status.is_terminal() {
            debug!(desire_id = %desire.id, status = ?desire.status, "desire already settled");
            return Ok(DesireDecision::Settled(desire));
        }

        let target = score.clamp(0.0, 1.0);
        let previous = desire.intensity;
        desire.intensity = reinforced_intensity(previous, target, self.config.reinforcement_rate);
        desire.last_updated = Utc::now();
        self.store.update(&desire).await?;

        debug!(
            desire_id = %desire.id,
            previous,
            intensity = desire.intensity,
            "desire reinforced"
        );
        Ok(DesireDecision::Updated(desire))
    }

    /// Existing desire behind an opinion, if the store still has it
    pub async fn linked_desire(&self, opinion: &OpinionEntry) -> Result<Option<DesireEntry>> {
        match opinion.associated_desire {
            Some(id) => self.store.get(id).await,
            None => Ok(None),
        }
    }
}

/// Move `current` a fraction `rate` of the way toward `target`
fn reinforced_intensity(current: f32, target: f32, rate: f32) -> f32 {
    (current + rate.clamp(0.0, 1.0) * (target - current)).clamp(0.0, 1.0)
}
