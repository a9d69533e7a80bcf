//! Extension settings store
//!
//! A flat key-value object mirrored from the extension's local storage. Keys
//! keep the extension's camelCase spelling so the shim can hand its storage
//! object over unchanged.

use crate::paint::CounterMode;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default toolbar icon file
pub const DEFAULT_ICON: &str = "tabcounter.plain.min.svg";

/// Default badge background color
pub const DEFAULT_BADGE_COLOR: &str = "#999999";

/// Default full pan cycle (left, right, back to left)
pub const DEFAULT_PAN_PERIOD_MS: u64 = 2400;

/// Persisted extension settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Release that last wrote these settings
    #[serde(default = "default_version")]
    pub version: String,

    /// Toolbar icon file under `icons/`
    #[serde(default = "default_icon")]
    pub icon: String,

    /// Counter mode (0 to 4, see [`CounterMode`])
    #[serde(default)]
    pub counter: u8,

    /// Badge background color
    #[serde(default = "default_badge_color")]
    pub badge_color: String,

    /// Badge text color, when not automatic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_text_color: Option<String>,

    /// Let the browser pick a readable badge text color
    #[serde(default)]
    pub badge_text_color_auto: bool,

    /// Full pan cycle in milliseconds
    #[serde(default = "default_pan_period")]
    pub pan_period_ms: u64,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

fn default_badge_color() -> String {
    DEFAULT_BADGE_COLOR.to_string()
}

fn default_pan_period() -> u64 {
    DEFAULT_PAN_PERIOD_MS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            icon: default_icon(),
            counter: 0,
            badge_color: default_badge_color(),
            badge_text_color: None,
            badge_text_color_auto: false,
            pan_period_ms: default_pan_period(),
        }
    }
}

impl Settings {
    /// Counter mode, treating unknown values as the current-window counter
    pub fn counter_mode(&self) -> CounterMode {
        CounterMode::try_from(self.counter).unwrap_or_else(|value| {
            warn!("Unknown counter mode {}, using current window", value);
            CounterMode::CurrentWindow
        })
    }

    pub fn pan_period(&self) -> Duration {
        Duration::from_millis(self.pan_period_ms.max(1))
    }

    /// Icon path relative to the extension root
    pub fn icon_path(&self) -> String {
        format!("icons/{}", self.icon)
    }

    /// Record the running release as the writer of these settings
    pub fn stamp_version(&mut self) {
        self.version = env!("CARGO_PKG_VERSION").to_string();
    }
}

/// JSON file holding the [`Settings`] object
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform data directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, seeding defaults when nothing was stored yet
    pub fn load(&self) -> Result<Settings> {
        let mut settings = if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read settings file: {:?}", self.path))?;
            serde_json::from_str::<Settings>(&content)
                .with_context(|| format!("Failed to parse settings file: {:?}", self.path))?
        } else {
            Settings::default()
        };
        settings.stamp_version();
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings file: {:?}", self.path))?;

        Ok(())
    }

    /// Get the settings file path
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "tabcounter", "TabCounter")
            .context("Failed to determine settings directory")?;
        Ok(proj_dirs.data_dir().join("settings.json"))
    }
}
