//! Anima Life Engine
//!
//! The part of Anima that turns conversation into inner state:
//!
//! - **AffectState**: continuous pleasure/arousal/dominance, clamped per axis
//!   and owned by a single [`SessionState`].
//!
//! - **MoodClassifier**: nearest-center mapping from affect to one of twelve
//!   named [`MoodArchetype`]s. Mood is always derived, never stored.
//!
//! - **PipelineOrchestrator**: memory → opinion → desire with a bounded
//!   retry budget per stage and per-opinion failure isolation.
//!
//! - **DesireThresholdEngine**: candidacy scoring, threshold-gated desire
//!   creation and reinforcement of existing desires.
//!
//! - **InitiativePromoter**: promotes strong pending desires to
//!   `INITIATIVE` events on the shared queue.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use anima_plugin_lifeengine::{PipelineOrchestrator, SessionState};
//!
//! let mut session = SessionState::new(turn.session_id);
//! let report = orchestrator.run_turn(&mut session, turn).await?;
//! println!("mood is now {}", report.mood_after);
//! ```

#![warn(clippy::all)]

pub mod services;
pub mod session;
pub mod types;

pub use services::*;
pub use session::SessionState;
pub use types::*;
