//! # Slashing Protection Configuration
//!
//! Knobs for the database layer, transaction retries and pruning.
//! Every struct deserialises with per-field defaults so a partial TOML table
//! is valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::GenesisValidatorsRoot;

/// Everything needed to open a [`crate::DbSlashingProtection`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlashingProtectionConfig {
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub pruning: PruningConfig,
    /// Network root the importer must see in interchange metadata, when set.
    pub genesis_validators_root: Option<GenesisValidatorsRoot>,
}

// =============================================================================
// DATABASE
// =============================================================================

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log; readers never block the writer.
    #[default]
    Wal,
    /// Rollback journal.
    Delete,
}

impl JournalMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// SQLite `synchronous` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// fsync on every commit.
    #[default]
    Full,
    Normal,
}

impl SyncMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Parent directories are created.
    pub path: PathBuf,
    /// When false the pool holds exactly one connection.
    pub pool_enabled: bool,
    /// Connections held by the pool when pooling is enabled.
    pub pool_size: usize,
    /// How long a caller waits for a free connection.
    pub acquire_timeout_ms: u64,
    /// SQLite busy timeout; acts as the statement timeout.
    pub busy_timeout_ms: u64,
    pub journal_mode: JournalMode,
    pub sync_mode: SyncMode,
    /// Apply pending schema migrations when the database is opened.
    pub migrate_on_startup: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/slashing-protection.db"),
            pool_enabled: true,
            pool_size: 8,
            acquire_timeout_ms: 5_000,
            busy_timeout_ms: 5_000,
            journal_mode: JournalMode::Wal,
            sync_mode: SyncMode::Full,
            migrate_on_startup: true,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a database at `path`, all other values default.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_pool_enabled(mut self, enabled: bool) -> Self {
        self.pool_enabled = enabled;
        self
    }

    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    pub fn with_migrate_on_startup(mut self, migrate: bool) -> Self {
        self.migrate_on_startup = migrate;
        self
    }

    /// Number of connections the pool will actually open.
    pub fn effective_pool_size(&self) -> usize {
        if self.pool_enabled {
            self.pool_size.max(1)
        } else {
            1
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

// =============================================================================
// RETRY
// =============================================================================

/// Retry policy for transient transaction failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// First backoff delay; doubled on every retry.
    pub base_delay_ms: u64,
    /// Upper bound of the uniform random jitter added to each delay.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 10,
            jitter_ms: 20,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delays(mut self, base_delay_ms: u64, jitter_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.jitter_ms = jitter_ms;
        self
    }
}

// =============================================================================
// PRUNING
// =============================================================================

/// Pruning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    /// Whether the scheduled pruning runner is started.
    pub enabled: bool,
    /// Run one pruning pass before serving.
    pub at_boot: bool,
    /// History retained, in epochs.
    pub epochs_to_keep: u64,
    pub slots_per_epoch: u64,
    /// Period of the scheduled runner.
    pub interval_secs: u64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            at_boot: false,
            epochs_to_keep: 250,
            slots_per_epoch: 32,
            interval_secs: 12 * 60 * 60,
        }
    }
}

impl PruningConfig {
    pub fn with_retention(mut self, epochs_to_keep: u64, slots_per_epoch: u64) -> Self {
        self.epochs_to_keep = epochs_to_keep;
        self.slots_per_epoch = slots_per_epoch;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_pool_uses_single_connection() {
        let config = DatabaseConfig::default()
            .with_pool_size(16)
            .with_pool_enabled(false);
        assert_eq!(config.effective_pool_size(), 1);
    }

    #[test]
    fn test_zero_pool_size_still_opens_one_connection() {
        let config = DatabaseConfig::default().with_pool_size(0);
        assert_eq!(config.effective_pool_size(), 1);
    }

    #[test]
    fn test_pruning_disabled_by_default() {
        let config = PruningConfig::default();
        assert!(!config.enabled);
        assert!(!config.at_boot);
        assert_eq!(config.interval(), Duration::from_secs(43_200));
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let config: RetryConfig = serde_json::from_str(r#"{"max_retries": 2}"#).unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.base_delay_ms, 10);
    }
}
