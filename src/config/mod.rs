//! Application configuration.
//!
//! Aggregates the source, storage and import sections into a single Config
//! struct that can be loaded from YAML files or environment variables.

mod import;

pub use import::{
    ImportConfig, ReimportPolicy, DEFAULT_CREATED_BY, DEFAULT_MAX_SKJEMANUMMER_LENGTH,
    DEFAULT_MAX_VALUE_LENGTH,
};

use serde::Deserialize;

use crate::source::SourceConfig;
use crate::storage::StorageConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "FORMSYNC_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "FORMSYNC";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "FORMSYNC_LOG";

/// Legacy environment variable for the form.io base URL.
pub const FORMIO_BASE_URL_ENV_VAR: &str = "FORMIO_BASE_URL";
/// Legacy environment variable for the maximum number of forms to fetch.
pub const MAX_NUMBER_OF_FORMS_ENV_VAR: &str = "MAX_NUMBER_OF_FORMS";
/// Legacy environment variable enabling dry-run mode (`true`).
pub const DRY_RUN_ENV_VAR: &str = "DRY_RUN";
/// Environment variable for database URL.
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Content source (form.io) configuration.
    pub source: SourceConfig,
    /// Relational store configuration.
    pub storage: StorageConfig,
    /// Import policy.
    pub import: ImportConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. Legacy variables (`FORMIO_BASE_URL`, `MAX_NUMBER_OF_FORMS`,
    ///    `DRY_RUN`, `DATABASE_URL`)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let max_forms = std::env::var(MAX_NUMBER_OF_FORMS_ENV_VAR)
            .ok()
            .and_then(|v| v.parse::<i64>().ok());
        let dry_run = std::env::var(DRY_RUN_ENV_VAR).ok().map(|v| v == "true");

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("source.base_url", std::env::var(FORMIO_BASE_URL_ENV_VAR).ok())?
            .set_override_option("source.max_forms", max_forms)?
            .set_override_option("import.dry_run", dry_run)?
            .set_override_option("storage.url", std::env::var(DATABASE_URL_ENV_VAR).ok())?
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the importer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("source.base_url is not set (set {FORMIO_BASE_URL_ENV_VAR})")]
    MissingBaseUrl,
}
