//! Configuration loaded from `config.toml`.
//!
//! Every section and field is optional; anything left out takes its
//! default. Example:
//!
//! ```toml
//! db_path = "/var/lib/appseek/index.db"
//!
//! [search]
//! max_results = 10
//!
//! [index]
//! reindex_interval_secs = 600
//!
//! [scan]
//! roots = ["/opt", "/usr/local/bin"]
//! max_depth = 2
//! ```

use crate::error::{Result, ServerError};
use crate::services::{IndexConfig, SearchConfig};
use crate::sources::FilesystemScanConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Database location (default: [`crate::default_db_path`])
    pub db_path: Option<PathBuf>,
    pub search: SearchConfig,
    pub index: IndexConfig,
    pub scan: FilesystemScanConfig,
}

impl LauncherConfig {
    /// Loads configuration.
    ///
    /// With `explicit` set, that file must exist. Otherwise the default
    /// location is tried and a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if an explicit file is missing, or
    /// if any file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match crate::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    tracing::debug!("No config.toml found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Reads and parses one TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config = Self::from_toml(&raw)
            .map_err(|e| ServerError::Config(format!("Failed to parse {}: {e}", path.display())))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the parser error for malformed input or wrongly typed fields.
    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Database path: the configured one, or the platform default.
    #[must_use]
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(crate::default_db_path)
    }
}
