//! Engine configuration
//!
//! Loaded from a TOML file. Every section and field has a default, so an
//! empty file is a valid configuration (redb storage in the working
//! directory, the default severity seed, no retention).
//!
//! ```toml
//! [storage]
//! backend = "redb"
//! path = "/var/lib/sevlog/events.redb"
//!
//! [severity]
//! seed = ["DEBUG", "INFO", "WARNING", "ERROR"]
//!
//! [retention]
//! max_age_days = 90
//!
//! [logging]
//! default_level = "warn"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sevlog_core::{DEFAULT_SEVERITIES, LogError, validate_level_name};
use sevlog_logging::LogConfig;
use sevlog_storage::{RedbStorageConfig, RetentionPolicy, RetentionPolicyBuilder};

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub severity: SeverityConfig,
    pub retention: RetentionConfig,
    pub logging: LogConfig,
}

impl EngineConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML configuration text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Durable storage at `path` with every other setting defaulted
    pub fn redb(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Redb,
                path: path.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// In-memory storage with quiet logging, for tests
    pub fn testing() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                ..Default::default()
            },
            logging: LogConfig::testing(),
            ..Default::default()
        }
    }

    /// Check values that deserialize fine but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.severity.seed {
            validate_level_name(name).map_err(|e: LogError| ConfigError::Invalid(e.to_string()))?;
        }
        if self.storage.backend == StorageBackend::Redb && self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.path must be set for the redb backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Retention policy described by the `[retention]` section
    pub fn retention_policy(&self) -> RetentionPolicy {
        match self.retention.max_age_days {
            Some(days) => RetentionPolicyBuilder::new().max_age_days(days).build(),
            None => RetentionPolicy::keep_forever(),
        }
    }
}

/// Which backend holds the level and message tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on exit
    Memory,
    /// Durable single-file database
    #[default]
    Redb,
}

/// `[storage]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file (redb backend only)
    pub path: PathBuf,
    /// Page cache size in bytes
    pub cache_size: usize,
    /// Flush every commit to disk before `write` returns
    pub sync_on_write: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let redb = RedbStorageConfig::default();
        Self {
            backend: StorageBackend::default(),
            path: PathBuf::from("sevlog.redb"),
            cache_size: redb.cache_size,
            sync_on_write: redb.sync_on_write,
        }
    }
}

impl StorageConfig {
    /// Settings for opening the redb database
    pub fn redb_config(&self) -> RedbStorageConfig {
        RedbStorageConfig {
            db_path: self.path.clone(),
            cache_size: self.cache_size,
            sync_on_write: self.sync_on_write,
        }
    }
}

/// `[severity]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityConfig {
    /// Levels registered on open, in identifier order
    pub seed: Vec<String>,
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEVERITIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// `[retention]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Purge messages older than this many days (`None` keeps everything)
    pub max_age_days: Option<u64>,
}
