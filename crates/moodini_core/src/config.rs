//! Service configuration.
//!
//! # Responsibility
//! - Describe which store backend to open and how logging is set up.
//! - Load configuration from JSON files with every field defaulted.
//!
//! # Invariants
//! - `read_connections` is at least 1 after validation.
//! - A SQLite backend always has a non-empty `db_path`.

use crate::logging::default_log_level;
use crate::store::sqlite::DEFAULT_READ_CONNECTIONS;
use crate::store::{SqliteController, StoreResult};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_DB_FILE_NAME: &str = "moodini.sqlite3";

/// Question store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Volatile store; contents vanish on shutdown.
    Memory,
    /// Durable SQLite file store.
    #[default]
    Sqlite,
}

/// Top-level configuration for one service instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub backend: StoreBackend,
    pub db_path: PathBuf,
    /// Number of snapshot reader connections for the SQLite backend.
    pub read_connections: usize,
    pub log_level: String,
    /// Absolute log directory. Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            read_connections: DEFAULT_READ_CONNECTIONS,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Loads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        Self::from_json(&raw)
    }

    /// Parses and validates configuration from JSON text.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_connections == 0 {
            return Err(ConfigError::Invalid(
                "read_connections must be at least 1".to_string(),
            ));
        }
        if self.backend == StoreBackend::Sqlite && self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "db_path is required for the sqlite backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Opens the SQLite controller described by this configuration.
    pub fn open_sqlite(&self) -> StoreResult<SqliteController> {
        SqliteController::open(&self.db_path, self.read_connections)
    }
}

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
