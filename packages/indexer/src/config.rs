//! Indexer Configuration
//!
//! Well-known contract addresses and code ids the router compares decoded
//! payloads against, plus the ingest loop settings. Loaded from TOML.

use std::fs;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default capacity of the ingest channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid log level: {0}")]
    LogLevel(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Tracing(String),
}

/// What the ingest loop does when a transaction fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the stream at the failing transaction
    #[default]
    Halt,
    /// Log the failure and continue with the next transaction
    Skip,
}

/// Well-known contracts, compared by exact equality
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Address of the name-service registry contract
    pub registry_contract_address: String,
    /// Code id of the collection minter template
    pub minter_code_id: u64,
    /// Address of the marketplace vault contract
    pub vault_contract_address: String,
    /// Image used for registry tokens without one
    pub registry_default_image_url: String,
}

/// Top-level indexer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub log_level: String,
    pub failure_policy: FailurePolicy,
    pub channel_capacity: usize,
    pub contracts: ContractsConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            failure_policy: FailurePolicy::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            contracts: ContractsConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file; a leading `~/` is expanded to the home directory
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let expanded = expand_path(path);
        let content = fs::read_to_string(&expanded).map_err(|source| ConfigError::Read {
            path: expanded.clone(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parsed `log_level`
    pub fn level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level).map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    /// Install a global fmt subscriber at the configured level
    pub fn init_tracing(&self) -> Result<(), ConfigError> {
        tracing_subscriber::fmt()
            .with_max_level(self.level()?)
            .try_init()
            .map_err(|e| ConfigError::Tracing(e.to_string()))
    }
}

/// Expand ~ to home directory in path
pub fn expand_path(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
