//! Loading and saving `PoolConfig` as an INI file.

use ini::Ini;
use std::path::Path;
use thiserror::Error;

use super::parser::{parse_ini, to_ini};
use super::settings::PoolConfig;

/// Errors from reading or validating a pool configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(#[source] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl PoolConfig {
    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Read configuration from an already loaded INI document.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        parse_ini(ini)
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::WriteError)?;
        }
        to_ini(self)
            .write_to_file(path)
            .map_err(ConfigError::WriteError)
    }
}
