//! Dashboard configuration.
//!
//! Stored as TOML at `~/.config/lendash/config.toml` (or XDG equivalent).
//! A missing file means defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! [load]
//! on_invalid_row = "skip"
//!
//! [format]
//! max_display_items = 8
//! max_label_length = 40
//!
//! [defaults]
//! top_n = 10
//! pivot_top_k = 10
//! trend_fallback_top_k = 5
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::OperatorDefaults;
use crate::projection::FormatConfig;
use crate::store::LoadOptions;

/// Errors that can occur when loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub load: LoadOptions,
    pub format: FormatConfig,
    pub defaults: OperatorDefaults,
}

impl DashboardConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the default configuration file path.
    ///
    /// Uses XDG conventions:
    /// - Primary: `$XDG_CONFIG_HOME/lendash/config.toml`
    /// - Fallback: platform-specific config dir (e.g., `~/.config/lendash/config.toml` on Linux)
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join("lendash").join("config.toml"));
        }

        dirs::config_dir()
            .map(|p| p.join("lendash").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.format.max_display_items == 0 {
            return Err(ConfigError::Validation(
                "format.max_display_items must be at least 1".into(),
            ));
        }
        if self.format.max_label_length == 0 {
            return Err(ConfigError::Validation(
                "format.max_label_length must be at least 1".into(),
            ));
        }

        for (name, value) in [
            ("defaults.top_n", self.defaults.top_n),
            ("defaults.pivot_top_k", self.defaults.pivot_top_k),
            ("defaults.trend_fallback_top_k", self.defaults.trend_fallback_top_k),
        ] {
            if value <= 0 {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a positive integer, got {value}"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
