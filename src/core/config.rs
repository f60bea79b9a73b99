//! Configuration management

use crate::core::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        let app_config_dir = config_dir.join("procenergy-tracker");

        if !app_config_dir.exists() {
            fs::create_dir_all(&app_config_dir)?;
        }

        Ok(app_config_dir.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults if the file is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the poll driver cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.general.max_points == 0 {
            return Err(Error::Config("max_points must be at least 1".to_string()));
        }
        if self.general.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be at least 1".to_string()));
        }
        if self.source.timeout_ms == 0 {
            return Err(Error::Config("source.timeout_ms must be at least 1".to_string()));
        }
        if StrftimeItems::new(&self.display.label_format).any(|item| matches!(item, Item::Error)) {
            return Err(Error::Config(format!(
                "Invalid label_format '{}'",
                self.display.label_format
            )));
        }
        match self.display.timezone.as_str() {
            "local" | "utc" => Ok(()),
            other => Err(Error::Config(format!(
                "Unknown timezone '{}' (expected \"local\" or \"utc\")",
                other
            ))),
        }
    }
}

/// Polling and retention settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Poll cadence in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Maximum number of timeline points kept in memory
    #[serde(default = "default_max_points")]
    pub max_points: usize,
    /// Drop series whose whole retained window is "no data"
    #[serde(default)]
    pub prune_idle_series: bool,
}

fn default_poll_interval() -> u64 { 1000 }
fn default_max_points() -> usize { 300 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_points: default_max_points(),
            prune_idle_series: false,
        }
    }
}

/// Where snapshots come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path of the text file holding the latest per-process readings
    #[serde(default = "default_locator")]
    pub locator: PathBuf,
    /// Upper bound for a single read before it counts as a transport failure
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_locator() -> PathBuf { PathBuf::from("/var/run/procenergy/snapshot.txt") }
fn default_timeout() -> u64 { 900 }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            locator: default_locator(),
            timeout_ms: default_timeout(),
        }
    }
}

/// Presentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Timezone for timeline labels: "local" or "utc"
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// strftime format for timeline labels
    #[serde(default = "default_label_format")]
    pub label_format: String,
    /// Rows printed by the CLI table (0 = all)
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,
}

fn default_timezone() -> String { "local".to_string() }
fn default_label_format() -> String { "%H:%M:%S".to_string() }
fn default_row_limit() -> usize { 20 }

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            label_format: default_label_format(),
            row_limit: default_row_limit(),
        }
    }
}
