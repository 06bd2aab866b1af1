//! # Anima
//!
//! Event-driven cognition pipeline for a conversational agent: conversation
//! turns become memories, memories become opinions, strong opinions become
//! desires, and strong desires become initiatives. Planned actions
//! (reminders, habits, multi-step plans) run next to it on a scheduler.
//!
//! This crate bundles the workspace and provides [`AnimaRuntime`], the one
//! place where components and collaborators are wired together.
//!
//! ## Crates
//!
//! - [`core`]: events, queues, data types, collaborator traits, config
//! - [`lifeengine`]: affect, mood, pipeline, desires, initiatives
//! - [`scheduler`]: cron, plan execution, the scheduled action engine
//!
//! ## Example
//!
//! ```rust,ignore
//! use anima::prelude::*;
//!
//! let mut runtime = AnimaRuntime::new(RuntimeOpts { config, memory, opinions, .. })?;
//! runtime.start().await?;
//! let report = runtime.process_turn(&mut session, turn).await?;
//! runtime.stop().await?;
//! ```

#![warn(clippy::all)]

pub mod runtime;

pub use anima_core as core;
pub use anima_plugin_lifeengine as lifeengine;
pub use anima_plugin_scheduler as scheduler;

pub use runtime::{AnimaRuntime, RuntimeOpts, RUNTIME_SOURCE};

/// Commonly used items
pub mod prelude {
    pub use crate::runtime::{AnimaRuntime, RuntimeOpts};
    pub use anima_core::*;
    pub use anima_plugin_lifeengine::{
        AffectState, DesireDecision, DesireThresholdEngine, InitiativePromoter, MoodArchetype,
        MoodClassifier, PipelineOrchestrator, PromotionReport, SessionState, TurnOutcome,
        TurnReport,
    };
    pub use anima_plugin_scheduler::{CronExpression, PlanExecutor, ScheduledActionEngine};
}
