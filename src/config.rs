//! Configuration loading and management.
//!
//! The host reads an optional `volley.toml` from the user config directory.
//! Every section has serde defaults, so a missing or partial file always
//! yields a usable configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extensions: ExtensionsConfig,
    pub hooks: HooksConfig,
}

/// Extension host settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    /// Managed extension install directory. Defaults to the platform data
    /// dir.
    pub directory: Option<PathBuf>,

    /// Host data directory (registry, storage namespaces).
    pub data_dir: Option<PathBuf>,

    /// Maximum number of warm isolates.
    pub max_isolates: usize,

    /// Seconds an isolate stays warm after last use.
    pub idle_timeout_secs: u64,

    /// Wall-clock seconds a single handler invocation may take.
    pub invocation_timeout_secs: u64,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            data_dir: None,
            max_isolates: 10,
            idle_timeout_secs: 30,
            invocation_timeout_secs: 30,
        }
    }
}

/// Out-of-process hook scripts (see [`crate::hooks`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub enable: bool,

    /// Script paths executed on terminal task events.
    pub paths: Vec<PathBuf>,

    /// Seconds to wait for a hook process before killing it.
    pub timeout_secs: u64,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            enable: false,
            paths: Vec::new(),
            timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load the configuration from the default location, falling back to
    /// defaults if no file exists.
    pub fn load() -> Self {
        let path = dirs::config_dir()
            .map(|d| d.join("volley").join("volley.toml"))
            .unwrap_or_else(|| PathBuf::from("volley.toml"));
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Io(_)) => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Self::default()
            }
        }
    }

    /// Load the configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
