//! Configuration file support for Sprout.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/sprout/config.toml`.
//! Every field has a default, so a partial (or missing) file is fine.

use crate::{Error, RatingMode, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub decks: DecksConfig,

    #[serde(default)]
    pub review: ReviewConfig,
}

/// Stats database location
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Deck directory location
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecksConfig {
    #[serde(default = "default_deck_dir")]
    pub dir: PathBuf,
}

impl Default for DecksConfig {
    fn default() -> Self {
        Self {
            dir: default_deck_dir(),
        }
    }
}

/// Review session defaults
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ReviewConfig {
    #[serde(default)]
    pub rating_mode: RatingMode,
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sprout")
        .join("stats.db")
}

fn default_deck_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            path => {
                tracing::debug!("No config file found at {:?}, using defaults", path);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {:?}: {}", path, e)))?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Invalid config {:?}: {}", path, e)))?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("sprout").join("config.toml"))
    }

    /// Check startup parameters before anything is opened
    pub fn validate(&self) -> Result<()> {
        if self.data.db_path.as_os_str().is_empty() {
            return Err(Error::Config("Stats database path is empty".into()));
        }
        if self.data.db_path.is_dir() {
            return Err(Error::Config(format!(
                "Stats database path {:?} is a directory",
                self.data.db_path
            )));
        }
        if !self.decks.dir.is_dir() {
            return Err(Error::Config(format!(
                "Deck directory {:?} does not exist",
                self.decks.dir
            )));
        }
        Ok(())
    }
}
