//! # Signer Configuration
//!
//! One TOML file, every table optional, every field defaulted. Environment
//! variables override the file:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `SIGNER_CONFIG` | path of the TOML file |
//! | `SIGNER_DB_PATH` | `database.path` |
//! | `SIGNER_PRUNING_ENABLED` | `pruning.enabled` |
//! | `SIGNER_EPOCHS_TO_KEEP` | `pruning.epochs_to_keep` |
//! | `SIGNER_SLOTS_PER_EPOCH` | `pruning.slots_per_epoch` |
//!
//! ```toml
//! [database]
//! path = "./data/slashing-protection.db"
//! pool_size = 8
//!
//! [pruning]
//! enabled = true
//! epochs_to_keep = 250
//!
//! [network]
//! genesis_validators_root = "0x04700007fabc8282644aed6d1c7c9e21d38a03a0c4ba193f3afe428824b3a673"
//!
//! [runtime]
//! max_blocking_workers = 16
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared_types::GenesisValidatorsRoot;
use slashing_protection::{DatabaseConfig, PruningConfig, RetryConfig, SlashingProtectionConfig};
use thiserror::Error;

pub const ENV_CONFIG: &str = "SIGNER_CONFIG";
pub const ENV_DB_PATH: &str = "SIGNER_DB_PATH";
pub const ENV_PRUNING_ENABLED: &str = "SIGNER_PRUNING_ENABLED";
pub const ENV_EPOCHS_TO_KEEP: &str = "SIGNER_EPOCHS_TO_KEEP";
pub const ENV_SLOTS_PER_EPOCH: &str = "SIGNER_SLOTS_PER_EPOCH";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {var}")]
    InvalidOverride { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete signer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub pruning: PruningConfig,
    pub network: NetworkConfig,
    pub runtime: RuntimeConfig,
}

/// Network identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Genesis validators root of the network being signed for. When set,
    /// interchange documents for other networks are refused.
    pub genesis_validators_root: Option<GenesisValidatorsRoot>,
}

/// Async host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on decisions running on blocking threads at once.
    pub max_blocking_workers: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_blocking_workers: 16,
        }
    }
}

impl SignerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// File named by `SIGNER_CONFIG` (defaults otherwise), then environment
    /// overrides, then validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(None)
    }

    /// Like [`Self::from_env`], with `file` taking precedence over
    /// `SIGNER_CONFIG`.
    pub fn resolve(file: Option<&Path>) -> Result<Self, ConfigError> {
        let lookup = |var: &str| std::env::var(var).ok();
        let file = file
            .map(Path::to_path_buf)
            .or_else(|| lookup(ENV_CONFIG).map(PathBuf::from));
        let mut config = match file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(value) = lookup(ENV_PRUNING_ENABLED) {
            self.pruning.enabled = parse_override(ENV_PRUNING_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_EPOCHS_TO_KEEP) {
            self.pruning.epochs_to_keep = parse_override(ENV_EPOCHS_TO_KEEP, &value)?;
        }
        if let Some(value) = lookup(ENV_SLOTS_PER_EPOCH) {
            self.pruning.slots_per_epoch = parse_override(ENV_SLOTS_PER_EPOCH, &value)?;
        }
        Ok(())
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.pool_enabled && self.database.pool_size == 0 {
            return Err(ConfigError::Invalid("database.pool_size must be positive".into()));
        }
        if self.pruning.epochs_to_keep == 0 || self.pruning.slots_per_epoch == 0 {
            return Err(ConfigError::Invalid(
                "pruning.epochs_to_keep and pruning.slots_per_epoch must be positive".into(),
            ));
        }
        if self.pruning.enabled && self.pruning.interval_secs == 0 {
            return Err(ConfigError::Invalid("pruning.interval_secs must be positive".into()));
        }
        if self.runtime.max_blocking_workers == 0 {
            return Err(ConfigError::Invalid(
                "runtime.max_blocking_workers must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The subset handed to the slashing-protection library.
    pub fn protection_config(&self) -> SlashingProtectionConfig {
        SlashingProtectionConfig {
            database: self.database.clone(),
            retry: self.retry.clone(),
            pruning: self.pruning.clone(),
            genesis_validators_root: self.network.genesis_validators_root,
        }
    }
}

fn parse_override<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride {
            var,
            value: value.to_string(),
        })
}
