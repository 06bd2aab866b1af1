//! Life Engine services

pub mod desire_engine;
pub mod initiative;
pub mod pipeline;

pub use desire_engine::{DesireDecision, DesireThresholdEngine};
pub use initiative::{InitiativePromoter, PromotionReport, INITIATIVE_SOURCE};
pub use pipeline::{DesireFailure, PipelineOrchestrator, TurnOutcome, TurnReport};
