//! Configuration module for gridstore.

use serde::Deserialize;
use std::path::Path;

use crate::store::DEFAULT_BUCKET_NAME;
use crate::{GridStoreError, Result};

/// Store connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// MongoDB connection string.
    #[serde(default = "default_uri")]
    pub uri: String,
    /// Database holding the bucket collections.
    #[serde(default = "default_database")]
    pub database: String,
    /// Bucket name (prefix of the `.files` and `.chunks` collections).
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Chunk size for new uploads, in bytes. The driver default applies when unset.
    #[serde(default)]
    pub chunk_size_bytes: Option<u32>,
}

fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "gridstore".to_string()
}

fn default_bucket() -> String {
    DEFAULT_BUCKET_NAME.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
            bucket: default_bucket(),
            chunk_size_bytes: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; stderr only when unset.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GridStoreError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GridStoreError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `GRIDSTORE_MONGODB_URI`: connection string
    /// - `GRIDSTORE_DATABASE`: database name
    /// - `GRIDSTORE_BUCKET`: bucket name
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(uri) = non_empty_env("GRIDSTORE_MONGODB_URI") {
            self.store.uri = uri;
        }
        if let Some(database) = non_empty_env("GRIDSTORE_DATABASE") {
            self.store.database = database;
        }
        if let Some(bucket) = non_empty_env("GRIDSTORE_BUCKET") {
            self.store.bucket = bucket;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the URI, database or bucket name is empty, or if
    /// the chunk size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.store.uri.trim().is_empty() {
            return Err(GridStoreError::Config("store.uri must not be empty".to_string()));
        }
        if self.store.database.trim().is_empty() {
            return Err(GridStoreError::Config(
                "store.database must not be empty".to_string(),
            ));
        }
        if self.store.bucket.trim().is_empty() {
            return Err(GridStoreError::Config(
                "store.bucket must not be empty".to_string(),
            ));
        }
        if self.store.chunk_size_bytes == Some(0) {
            return Err(GridStoreError::Config(
                "store.chunk_size_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
