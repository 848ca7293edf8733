//! User-configurable transition settings
//!
//! Read-only inputs to the playback core. Values arriving from the UI or a
//! config file are brought into range with [`TransitionSettings::normalized`]
//! rather than rejected.

use crate::fade_curves::FadeCurve;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shortest allowed crossfade in seconds
pub const MIN_CROSSFADE_SECS: f64 = 5.0;

/// Longest allowed crossfade in seconds
pub const MAX_CROSSFADE_SECS: f64 = 30.0;

pub const DEFAULT_CROSSFADE_SECS: f64 = 10.0;

/// Position polling cadence while playing
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Number of volume updates per crossfade
pub const DEFAULT_CROSSFADE_STEPS: u32 = 50;

/// Delay between a role swap and preloading the following track
pub const DEFAULT_PRELOAD_SETTLE_MS: u64 = 500;

/// How consecutive tracks are joined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionMode {
    /// Crossfade into the next track at its mix-out point
    #[default]
    Seamless,

    /// Let the outgoing track finish, then start the preloaded one
    Gapped,
}

impl std::fmt::Display for TransitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionMode::Seamless => write!(f, "seamless"),
            TransitionMode::Gapped => write!(f, "gapped"),
        }
    }
}

/// Transition settings consumed by the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionSettings {
    /// Automatic crossfades enabled
    pub auto_transition: bool,

    /// Crossfade length used when a track carries no hint (5-30 seconds)
    pub default_crossfade_secs: f64,

    pub mode: TransitionMode,

    pub fade_curve: FadeCurve,

    /// Playback position polling interval (100-5000 ms)
    pub poll_interval_ms: u64,

    /// Volume steps per crossfade (10-500)
    pub crossfade_steps: u32,

    /// Preload delay after a role swap (0-5000 ms)
    pub preload_settle_ms: u64,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            auto_transition: true,
            default_crossfade_secs: DEFAULT_CROSSFADE_SECS,
            mode: TransitionMode::Seamless,
            fade_curve: FadeCurve::EqualPower,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            crossfade_steps: DEFAULT_CROSSFADE_STEPS,
            preload_settle_ms: DEFAULT_PRELOAD_SETTLE_MS,
        }
    }
}

impl TransitionSettings {
    /// Return a copy with every field clamped into its valid range
    ///
    /// Each adjusted value is logged at warn level.
    pub fn normalized(&self) -> Self {
        let default_crossfade_secs = if self.default_crossfade_secs.is_finite() {
            clamp_crossfade_secs(self.default_crossfade_secs)
        } else {
            DEFAULT_CROSSFADE_SECS
        };
        if default_crossfade_secs != self.default_crossfade_secs {
            warn!(
                "default_crossfade_secs {} out of range, using {}",
                self.default_crossfade_secs, default_crossfade_secs
            );
        }

        let poll_interval_ms = self.poll_interval_ms.clamp(100, 5000);
        if poll_interval_ms != self.poll_interval_ms {
            warn!(
                "poll_interval_ms {} out of range, using {}",
                self.poll_interval_ms, poll_interval_ms
            );
        }

        let crossfade_steps = self.crossfade_steps.clamp(10, 500);
        if crossfade_steps != self.crossfade_steps {
            warn!(
                "crossfade_steps {} out of range, using {}",
                self.crossfade_steps, crossfade_steps
            );
        }

        let preload_settle_ms = self.preload_settle_ms.min(5000);
        if preload_settle_ms != self.preload_settle_ms {
            warn!(
                "preload_settle_ms {} out of range, using {}",
                self.preload_settle_ms, preload_settle_ms
            );
        }

        Self {
            auto_transition: self.auto_transition,
            default_crossfade_secs,
            mode: self.mode,
            fade_curve: self.fade_curve,
            poll_interval_ms,
            crossfade_steps,
            preload_settle_ms,
        }
    }

    /// Whether the scheduler should watch playback position at all
    pub fn crossfades_enabled(&self) -> bool {
        self.auto_transition && self.mode == TransitionMode::Seamless
    }
}

/// Clamp a crossfade length to [`MIN_CROSSFADE_SECS`, `MAX_CROSSFADE_SECS`]
pub fn clamp_crossfade_secs(secs: f64) -> f64 {
    secs.clamp(MIN_CROSSFADE_SECS, MAX_CROSSFADE_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = TransitionSettings::default();
        assert!(settings.auto_transition);
        assert_eq!(settings.default_crossfade_secs, 10.0);
        assert_eq!(settings.mode, TransitionMode::Seamless);
        assert_eq!(settings.poll_interval_ms, 500);
        assert_eq!(settings.crossfade_steps, 50);
        assert!(settings.crossfades_enabled());
    }

    #[test]
    fn test_normalized_clamps_crossfade() {
        let short = TransitionSettings {
            default_crossfade_secs: 1.0,
            ..Default::default()
        };
        assert_eq!(short.normalized().default_crossfade_secs, 5.0);

        let long = TransitionSettings {
            default_crossfade_secs: 90.0,
            ..Default::default()
        };
        assert_eq!(long.normalized().default_crossfade_secs, 30.0);

        let nan = TransitionSettings {
            default_crossfade_secs: f64::NAN,
            ..Default::default()
        };
        assert_eq!(nan.normalized().default_crossfade_secs, DEFAULT_CROSSFADE_SECS);
    }

    #[test]
    fn test_normalized_clamps_timers() {
        let settings = TransitionSettings {
            poll_interval_ms: 1,
            crossfade_steps: 0,
            preload_settle_ms: 60_000,
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.poll_interval_ms, 100);
        assert_eq!(settings.crossfade_steps, 10);
        assert_eq!(settings.preload_settle_ms, 5000);
    }

    #[test]
    fn test_gapped_mode_disables_crossfades() {
        let settings = TransitionSettings {
            mode: TransitionMode::Gapped,
            ..Default::default()
        };
        assert!(!settings.crossfades_enabled());

        let disabled = TransitionSettings {
            auto_transition: false,
            ..Default::default()
        };
        assert!(!disabled.crossfades_enabled());
    }
}
