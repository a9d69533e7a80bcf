//! Configuration management

use crate::icon::{FontBackend, StylePreset};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Paint scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaintConfig {
    /// Trailing delay that coalesces bursts of tab/window events
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    /// Leading-edge window applied when the active tab changes
    #[serde(default = "default_activation_window")]
    pub activation_window_ms: u64,
}

fn default_debounce() -> u64 {
    50
}
fn default_activation_window() -> u64 {
    1000
}

impl PaintConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn activation_window(&self) -> Duration {
        Duration::from_millis(self.activation_window_ms)
    }
}

impl Default for PaintConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            activation_window_ms: default_activation_window(),
        }
    }
}

/// Panning animation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanConfig {
    /// Animation frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Icon style preset
    #[serde(default)]
    pub style: StylePreset,
}

fn default_fps() -> u32 {
    30
}

impl Default for PanConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            style: StylePreset::default(),
        }
    }
}

/// Font configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FontConfig {
    /// Where glyph outlines come from
    #[serde(default)]
    pub backend: FontBackend,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Paint scheduling
    #[serde(default)]
    pub paint: PaintConfig,
    /// Panning animation
    #[serde(default)]
    pub pan: PanConfig,
    /// Font lookup
    #[serde(default)]
    pub font: FontConfig,
    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, falling back to defaults if it is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Write the embedded default file to `config_path`. An existing file is
    /// left untouched; returns whether anything was written.
    pub fn write_default(config_path: &Path) -> Result<bool> {
        if config_path.exists() {
            return Ok(false);
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        std::fs::write(config_path, Self::default_config_str())
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(true)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "tabcounter", "TabCounter")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Get the default configuration embedded in the binary
    pub fn default_config_str() -> &'static str {
        include_str!("../../config/default.toml")
    }
}
