//! Configuration persistence module
//!
//! TOML configuration stored in the platform config directory:
//! - Linux: ~/.config/audiodeck/config.toml
//! - Windows: %APPDATA%\audiodeck\config.toml
//! - macOS: ~/Library/Application Support/audiodeck/config.toml

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::RecordFormat;
use crate::deck::DestinationNamer;

/// Application name used for configuration directory
const APP_NAME: &str = "audiodeck";

/// Metering cadence in ticks per second
const DEFAULT_TICK_HZ: u32 = 60;

const MAX_TICK_HZ: u32 = 240;

/// Errors loading, validating or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Deck configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeckConfig {
    /// Metering samples per second while recording or playing
    pub tick_hz: u32,

    /// Where new recordings are written (None = system temp directory)
    pub scratch_dir: Option<PathBuf>,

    /// File name prefix for new recordings
    pub file_prefix: String,

    /// Container extension for new recordings, without the dot
    pub extension: String,

    /// Capture sample rate in Hz
    pub sample_rate_hz: u32,

    /// Capture channel count
    pub channels: u16,

    /// Input device name (None = system default)
    pub input_device: Option<String>,

    /// Output device name (None = system default)
    pub output_device: Option<String>,
}

impl Default for DeckConfig {
    fn default() -> Self {
        let format = RecordFormat::default();
        Self {
            tick_hz: DEFAULT_TICK_HZ,
            scratch_dir: None,
            file_prefix: "recording".to_string(),
            extension: "wav".to_string(),
            sample_rate_hz: format.sample_rate_hz,
            channels: format.channels,
            input_device: None,
            output_device: None,
        }
    }
}

impl DeckConfig {
    /// Validate the configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_TICK_HZ).contains(&self.tick_hz) {
            return Err(ConfigError::Invalid(format!(
                "tick_hz must be between 1 and {}, got {}",
                MAX_TICK_HZ, self.tick_hz
            )));
        }

        if self.sample_rate_hz == 0 {
            return Err(ConfigError::Invalid("sample_rate_hz must be non-zero".into()));
        }

        if self.channels == 0 {
            return Err(ConfigError::Invalid("channels must be non-zero".into()));
        }

        if self.extension.is_empty() || self.extension.contains('.') {
            return Err(ConfigError::Invalid(format!(
                "extension must be non-empty and without dots, got {:?}",
                self.extension
            )));
        }

        Ok(())
    }

    /// Resolved scratch directory
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Capture format; metering is always on
    pub fn record_format(&self) -> RecordFormat {
        RecordFormat {
            sample_rate_hz: self.sample_rate_hz,
            channels: self.channels,
            metering: true,
        }
    }

    pub fn namer(&self) -> DestinationNamer {
        DestinationNamer::new(self.scratch_dir(), &self.file_prefix, &self.extension)
    }
}

/// Default configuration file path
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<DeckConfig, ConfigError> {
    if !path.exists() {
        return Ok(DeckConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: DeckConfig = toml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

/// Save configuration to `path`, creating its directory if needed
pub fn save_config(config: &DeckConfig, path: &Path) -> Result<(), ConfigError> {
    config.validate()?;

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
