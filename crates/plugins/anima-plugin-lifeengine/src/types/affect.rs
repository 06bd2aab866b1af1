//! Continuous affect in PAD space
//!
//! Pleasure, arousal and dominance each live in [-1, 1]. Every mutation is
//! additive and each axis is clamped on its own afterwards.

use serde::{Deserialize, Serialize};

/// Pleasure/arousal/dominance state of one session
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AffectState {
    pleasure: f32,
    arousal: f32,
    dominance: f32,
}

impl AffectState {
    /// Neutral affect at the origin
    pub const NEUTRAL: AffectState = AffectState {
        pleasure: 0.0,
        arousal: 0.0,
        dominance: 0.0,
    };

    /// Create a state, clamping each axis to [-1, 1]
    pub fn new(pleasure: f32, arousal: f32, dominance: f32) -> Self {
        Self {
            pleasure: clamp_axis(pleasure),
            arousal: clamp_axis(arousal),
            dominance: clamp_axis(dominance),
        }
    }

    /// Add the deltas, then clamp every axis independently
    pub fn update(&mut self, delta_pleasure: f32, delta_arousal: f32, delta_dominance: f32) {
        self.pleasure = clamp_axis(self.pleasure + delta_pleasure);
        self.arousal = clamp_axis(self.arousal + delta_arousal);
        self.dominance = clamp_axis(self.dominance + delta_dominance);
    }

    /// Pleasure-displeasure axis
    pub fn pleasure(&self) -> f32 {
        self.pleasure
    }

    /// Activation-deactivation axis
    pub fn arousal(&self) -> f32 {
        self.arousal
    }

    /// Dominance-submissiveness axis
    pub fn dominance(&self) -> f32 {
        self.dominance
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Self) -> f32 {
        let dp = self.pleasure - other.pleasure;
        let da = self.arousal - other.arousal;
        let dd = self.dominance - other.dominance;
        (dp * dp + da * da + dd * dd).sqrt()
    }
}

fn clamp_axis(value: f32) -> f32 {
    // NaN would poison every later distance.
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0)
}
