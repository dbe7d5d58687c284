//! # Reqflow Configuration System
//!
//! Typed configuration for the batch engine. Every section has working
//! defaults so an empty file (or no file at all) yields a usable engine;
//! values are layered by [`ConfigManager`]:
//!
//! 1. built-in defaults
//! 2. an optional YAML file
//! 3. `REQFLOW__SECTION__KEY` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reqflow_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("config/reqflow.yaml")?;
//! let retries = manager.config().retry.max_retries;
//! let downloads = manager.config().batch.download_max_concurrent;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{defaults, status, DEFAULT_TYPE_NAMES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring reqflow.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReqflowConfig {
    /// Request catalog connection settings
    pub database: DatabaseConfig,

    /// Remote file store layout
    pub file_store: FileStoreConfig,

    /// Backoff and retry configuration for gateway calls
    pub retry: RetryConfig,

    /// Batch concurrency limits
    pub batch: BatchConfig,

    /// Request lookup defaults
    pub query: QueryConfig,
}

/// Database connection and pooling configuration
///
/// Credentials are never stored here; they come from the
/// [`CredentialProvider`](crate::gateways::CredentialProvider) handed to the
/// request manager.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL; overrides host/port/database when set
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            database: "admin_reporting".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Remote file store layout
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// Local mount point the file store paths are resolved against
    pub root: String,
    /// Where processed request output lives
    pub processed_root: String,
    /// Backup archive consulted when a processed path is absent
    pub backup_root: String,
    /// Host offered when the credential provider has none
    pub default_host: String,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            processed_root: defaults::PROCESSED_ROOT.to_string(),
            backup_root: defaults::BACKUP_ROOT.to_string(),
            default_host: defaults::FILE_STORE_HOST.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            initial_delay_ms: defaults::INITIAL_DELAY_MS,
            backoff_factor: defaults::BACKOFF_FACTOR,
            max_delay_ms: defaults::MAX_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub download_max_concurrent: usize,
    pub restore_max_concurrent: usize,
    pub rerun_max_concurrent: usize,
    /// Batch-wide deadline; items not dispatched by then are reported cancelled
    pub timeout_seconds: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            download_max_concurrent: defaults::DOWNLOAD_MAX_CONCURRENT,
            restore_max_concurrent: defaults::RESTORE_MAX_CONCURRENT,
            rerun_max_concurrent: defaults::RERUN_MAX_CONCURRENT,
            timeout_seconds: None,
        }
    }
}

impl BatchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_statuses: Vec<i32>,
    pub default_type_names: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_statuses: status::DEFAULT_STATUSES.to_vec(),
            default_type_names: DEFAULT_TYPE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ReqflowConfig {
    /// Validate cross-field constraints the type system cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        let limits = [
            ("batch.download_max_concurrent", self.batch.download_max_concurrent),
            ("batch.restore_max_concurrent", self.batch.restore_max_concurrent),
            ("batch.rerun_max_concurrent", self.batch.rerun_max_concurrent),
        ];
        for (field, value) in limits {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(field, "must be at least 1"));
            }
        }

        if !(self.retry.backoff_factor >= 1.0) {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_factor",
                format!("must be >= 1.0, got {}", self.retry.backoff_factor),
            ));
        }

        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.max_delay_ms",
                "must not be smaller than retry.initial_delay_ms",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "must be at least 1",
            ));
        }

        if self.file_store.processed_root.trim().is_empty() {
            return Err(ConfigurationError::MissingRequired(
                "file_store.processed_root".to_string(),
            ));
        }

        if self.file_store.backup_root.trim().is_empty() {
            return Err(ConfigurationError::MissingRequired(
                "file_store.backup_root".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration as JSON with the database URL masked
    pub fn sanitized(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(url) = value.pointer_mut("/database/url") {
            if !url.is_null() {
                *url = serde_json::Value::String("***REDACTED***".to_string());
            }
        }
        value
    }
}
