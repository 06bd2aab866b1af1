//! Core types for the cognition pipeline

mod desire;
mod events;
mod feedback;
mod memory;
mod opinion;
mod planned_action;
mod service;

pub use desire::*;
pub use events::*;
pub use feedback::*;
pub use memory::*;
pub use opinion::*;
pub use planned_action::*;
pub use service::*;
