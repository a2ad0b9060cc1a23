//! Daemon settings and configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const LOG_TARGET: &str = "koalad::config";

/// Daemon settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// ALSA device to use for audio playback
    #[serde(default = "default_alsa_device")]
    pub alsa_device: String,
    /// Unix socket the control surface listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Discard audio instead of opening a sound device
    #[serde(default)]
    pub null_output: bool,
}

fn default_alsa_device() -> String {
    "default".to_string()
}

fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("koalad.sock")
}

/// Error types for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            alsa_device: default_alsa_device(),
            socket_path: default_socket_path(),
            null_output: false,
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(target: LOG_TARGET, "No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        debug!(target: LOG_TARGET, "Loaded config from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("koalad").join("config.json")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.null_output && self.alsa_device.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ALSA device cannot be empty unless null output is enabled".to_string(),
            ));
        }

        if self.socket_path.file_name().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "Socket path {} does not name a file",
                self.socket_path.display()
            )));
        }

        Ok(())
    }
}
