//! Initiative Promoter
//!
//! Turns strong pending desires into `INITIATIVE` events. A desire is
//! marked `Active` only after its event made it into the queue, so a full
//! queue leaves it `Pending` for the next pass.

use anima_core::{
    wait_for_shutdown, DesireStatus, DesireStore, Event, EventQueue, InitiativeConfig, Result,
    ShutdownReceiver,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Event source name used for promoted initiatives
pub const INITIATIVE_SOURCE: &str = "initiative_promoter";

/// Outcome of one promotion pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromotionReport {
    /// Pending desires looked at
    pub examined: usize,
    /// Desires promoted and marked active
    pub promoted: Vec<Uuid>,
    /// Above threshold but refused by a full queue; still pending
    pub deferred: Vec<Uuid>,
    /// Enqueued but the status change could not be persisted
    pub unpersisted: Vec<Uuid>,
}

/// Threshold-gated desire-to-initiative promotion
#[derive(Clone)]
pub struct InitiativePromoter {
    store: Arc<dyn DesireStore>,
    queue: Arc<EventQueue>,
    config: InitiativeConfig,
}

impl InitiativePromoter {
    /// Create a promoter writing into `queue`
    pub fn new(
        store: Arc<dyn DesireStore>,
        queue: Arc<EventQueue>,
        config: InitiativeConfig,
    ) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    /// Intensity a pending desire needs to be promoted
    pub fn trigger_threshold(&self) -> f32 {
        self.config.trigger_threshold
    }

    /// One promotion pass over every pending desire
    pub async fn run_once(&self) -> Result<PromotionReport> {
        let pending = self.store.pending().await?;
        let mut report = PromotionReport {
            examined: pending.len(),
            ..Default::default()
        };

        for mut desire in pending {
            // The store may hand back stale rows; only Pending is eligible.
            if desire.status != DesireStatus::Pending {
                continue;
            }
            if desire.intensity < self.config.trigger_threshold {
                continue;
            }

            let desire_id = desire.id;
            if !self.queue.offer(Event::initiative(desire.clone(), INITIATIVE_SOURCE)) {
                warn!(%desire_id, "event queue full, initiative deferred");
                report.deferred.push(desire_id);
                continue;
            }

            desire.transition(DesireStatus::Active);
            match self.store.update(&desire).await {
                Ok(()) => {
                    info!(
                        %desire_id,
                        label = %desire.label,
                        intensity = desire.intensity,
                        "desire promoted to initiative"
                    );
                    report.promoted.push(desire_id);
                }
                Err(e) => {
                    error!(%desire_id, error = %e, "initiative enqueued but status not persisted");
                    report.unpersisted.push(desire_id);
                }
            }
        }

        debug!(
            examined = report.examined,
            promoted = report.promoted.len(),
            deferred = report.deferred.len(),
            "initiative pass finished"
        );
        Ok(report)
    }

    /// Run a pass every `interval` until shutdown
    pub async fn run_periodically(&self, interval: Duration, mut shutdown: ShutdownReceiver) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_ms = interval.as_millis() as u64, "initiative promoter started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "initiative pass failed");
                    }
                }
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }
        info!("initiative promoter stopped");
    }
}

impl std::fmt::Debug for InitiativePromoter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitiativePromoter")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .finish()
    }
}
