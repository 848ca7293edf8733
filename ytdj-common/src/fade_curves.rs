//! Fade curve implementations for crossfading between playback slots
//!
//! A curve maps normalized crossfade progress (0.0 to 1.0) to a pair of
//! gains: one for the outgoing slot and one for the incoming slot.
//!
//! - EqualPower: `out = cos(p·π/2)`, `in = sin(p·π/2)`
//! - Linear: `out = 1 - p`, `in = p`
//! - SCurve: `in = 0.5 × (1 - cos(π·p))`, `out = 1 - in`

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Fade curve types for crossfading
///
/// Each curve type provides a different perceptual quality:
/// - EqualPower: Constant perceived loudness during crossfade
/// - Linear: Constant rate of change (audible dip at the midpoint)
/// - SCurve: Smooth acceleration and deceleration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// sin/cos pair; `out² + in² = 1` at every position
    #[default]
    EqualPower,

    Linear,

    /// Raised-cosine pair; `out + in = 1` at every position
    SCurve,
}

impl FadeCurve {
    /// Calculate fade-in multiplier at given position
    ///
    /// # Arguments
    /// * `position` - Normalized position through fade (0.0 to 1.0)
    ///
    /// # Returns
    /// Volume multiplier for the incoming slot (0.0 = silence, 1.0 = full volume)
    pub fn fade_in(&self, position: f64) -> f64 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
            FadeCurve::Linear => t,
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
        }
    }

    /// Calculate fade-out multiplier at given position
    ///
    /// Returns 1.0 at the start of the fade and 0.0 at its end.
    pub fn fade_out(&self, position: f64) -> f64 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
        }
    }

    /// Gains for `(outgoing, incoming)` at the given position
    pub fn gains(&self, position: f64) -> (f64, f64) {
        (self.fade_out(position), self.fade_in(position))
    }

    /// Parse curve from a configuration string
    ///
    /// Supports:
    /// - 'equal_power', 'equalpower', 'equal-power'
    /// - 'linear'
    /// - 's_curve', 'scurve', 's-curve', 'cosine'
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "equal_power" | "equalpower" | "equal-power" => Some(FadeCurve::EqualPower),
            "linear" => Some(FadeCurve::Linear),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Some(FadeCurve::SCurve),
            _ => None,
        }
    }

    /// Canonical configuration value (lowercase, underscored)
    pub fn as_config_str(&self) -> &'static str {
        match self {
            FadeCurve::EqualPower => "equal_power",
            FadeCurve::Linear => "linear",
            FadeCurve::SCurve => "s_curve",
        }
    }

    /// Get human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::EqualPower => "Equal Power",
            FadeCurve::Linear => "Linear",
            FadeCurve::SCurve => "S-Curve",
        }
    }

    /// Get all available fade curve variants
    pub fn all_variants() -> &'static [FadeCurve] {
        &[FadeCurve::EqualPower, FadeCurve::Linear, FadeCurve::SCurve]
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
