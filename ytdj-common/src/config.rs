//! Configuration loading and config file resolution
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`YTDJ_CONFIG`)
//! 3. Per-user config file (`<config_dir>/ytdj/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file never prevents startup: a warning is logged and the
//! compiled defaults are used. A file that exists but fails to parse is an
//! error.

use crate::settings::TransitionSettings;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "YTDJ_CONFIG";

/// Contents of `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Default tracing filter directive (overridden by RUST_LOG)
    pub log_level: String,

    /// Master volume (0-100) applied to the audible slot
    pub master_volume: u8,

    pub transition: TransitionSettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            master_volume: 80,
            transition: TransitionSettings::default(),
        }
    }
}

impl TomlConfig {
    /// Parse a config from TOML text, normalizing out-of-range values
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: TomlConfig = toml::from_str(content)?;
        if config.master_volume > 100 {
            warn!("master_volume {} out of range, using 100", config.master_volume);
            config.master_volume = 100;
        }
        config.transition = config.transition.normalized();
        Ok(config)
    }

    /// Read and parse a config file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Resolves which config file (if any) to load
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the config file following the priority order
    ///
    /// Returns `None` when no candidate is named and the per-user file does
    /// not exist.
    pub fn resolve(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config file
        user_config_path().filter(|path| path.exists())
    }

    /// Load the resolved config, falling back to compiled defaults
    pub fn load(&self) -> Result<TomlConfig> {
        let Some(path) = self.resolve() else {
            info!("No config file found, using compiled defaults");
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            warn!(
                "Config file {} does not exist, using compiled defaults",
                path.display()
            );
            return Ok(TomlConfig::default());
        }

        info!("Loading config from {}", path.display());
        TomlConfig::load_from_path(&path)
    }
}

/// Default per-user config file location for the platform
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ytdj").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TransitionMode;
    use crate::FadeCurve;

    #[test]
    fn test_parse_full_config() {
        let config = TomlConfig::from_toml_str(
            r#"
            log_level = "debug"
            master_volume = 65

            [transition]
            auto_transition = false
            default_crossfade_secs = 12.0
            mode = "gapped"
            fade_curve = "linear"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.master_volume, 65);
        assert!(!config.transition.auto_transition);
        assert_eq!(config.transition.default_crossfade_secs, 12.0);
        assert_eq!(config.transition.mode, TransitionMode::Gapped);
        assert_eq!(config.transition.fade_curve, FadeCurve::Linear);
        // Unspecified fields keep their defaults
        assert_eq!(config.transition.poll_interval_ms, 500);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config = TomlConfig::from_toml_str(
            r#"
            master_volume = 180

            [transition]
            default_crossfade_secs = 45.0
            "#,
        )
        .unwrap();
        assert_eq!(config.master_volume, 100);
        assert_eq!(config.transition.default_crossfade_secs, 30.0);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let result = TomlConfig::from_toml_str("transition = [");
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
