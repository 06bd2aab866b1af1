//! Affect and mood types

pub mod affect;
pub mod mood;

pub use affect::*;
pub use mood::*;
