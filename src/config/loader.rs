//! Configuration Loader
//!
//! Layers an optional YAML file and `REQFLOW__*` environment variables over
//! the built-in defaults, then validates the result.

use super::error::{ConfigResult, ConfigurationError};
use super::ReqflowConfig;
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "REQFLOW_CONFIG";

const ENV_PREFIX: &str = "REQFLOW";
const ENV_SEPARATOR: &str = "__";

pub struct ConfigManager {
    config: ReqflowConfig,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from `REQFLOW_CONFIG` if set, defaults otherwise
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from_file(path),
            Err(_) => Self::build(None, true),
        }
    }

    /// Load configuration from a YAML file; the file must exist
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigurationError::load_error(
                path.display().to_string(),
                "file does not exist",
            ));
        }
        Self::build(Some(path), true)
    }

    /// Load a file without environment overrides (deterministic, used by tests and tooling)
    pub fn load_file_only(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(Some(path.as_ref()), false)
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: ReqflowConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source_path: None,
        }))
    }

    fn build(path: Option<&Path>, with_env: bool) -> ConfigResult<Arc<ConfigManager>> {
        let source_name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string());

        debug!(source = %source_name, with_env = with_env, "Loading configuration");

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }
        if with_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );
        }

        let config: ReqflowConfig = builder
            .build()
            .and_then(|raw| raw.try_deserialize())
            .map_err(|e| ConfigurationError::load_error(&source_name, e))?;

        config.validate()?;

        info!(
            source = %source_name,
            max_retries = config.retry.max_retries,
            download_max_concurrent = config.batch.download_max_concurrent,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            source_path: path.map(Path::to_path_buf),
        }))
    }

    pub fn config(&self) -> &ReqflowConfig {
        &self.config
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Sanitized configuration safe to log
    pub fn debug_config(&self) -> serde_json::Value {
        self.config.sanitized()
    }
}
