//! # Storage Layer
//!
//! SQLite persistence: schema migrations, the connection pool, transaction
//! retry, per-validator locks and the table DAOs.
//!
//! Every read-check-write runs in an [`IsolationLevel::Serializable`]
//! transaction (`BEGIN IMMEDIATE`), so at most one writer is inside a decision
//! at a time. Exports read through [`IsolationLevel::Snapshot`] transactions,
//! which under WAL see a consistent snapshot without blocking writers.

pub mod dao;
pub mod lock;
pub mod pool;
pub mod retry;
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Transaction, TransactionBehavior};
use shared_types::SigningRoot;
use tracing::info;

use crate::config::{DatabaseConfig, RetryConfig};
use crate::error::{SlashingProtectionError, SlashingProtectionResult};
use pool::{ConnectionPool, PooledConnection};
use retry::RetryPolicy;

/// Transaction isolation used by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Deferred transaction: consistent reads, upgrades to a writer lazily.
    Snapshot,
    /// Immediate transaction: the writer lock is taken at `BEGIN`.
    Serializable,
}

impl IsolationLevel {
    fn behavior(self) -> TransactionBehavior {
        match self {
            Self::Snapshot => TransactionBehavior::Deferred,
            Self::Serializable => TransactionBehavior::Immediate,
        }
    }
}

/// Handle to the slashing-protection database.
pub struct Database {
    pool: ConnectionPool,
    retry: RetryPolicy,
    path: PathBuf,
}

impl Database {
    /// Open the database, migrate if configured, and verify the schema
    /// version. A version mismatch is fatal.
    pub fn open(config: &DatabaseConfig, retry: &RetryConfig) -> SlashingProtectionResult<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut first = pool::open_connection(config)?;
        if config.migrate_on_startup {
            schema::migrate(&mut first)?;
        }
        schema::verify_version(&first)?;

        let size = config.effective_pool_size();
        let mut connections = Vec::with_capacity(size);
        connections.push(first);
        for _ in 1..size {
            connections.push(pool::open_connection(config)?);
        }

        info!(
            path = %config.path.display(),
            pool_size = size,
            schema_version = schema::EXPECTED_SCHEMA_VERSION,
            "Opened slashing protection database"
        );

        Ok(Self {
            pool: ConnectionPool::new(connections, config.acquire_timeout()),
            retry: RetryPolicy::from_config(retry),
            path: config.path.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Borrow a raw pooled connection.
    pub fn connection(&self) -> SlashingProtectionResult<PooledConnection<'_>> {
        self.pool.get()
    }

    /// Run `op` inside a transaction, committing on success and retrying the
    /// whole transaction on transient failure.
    pub fn in_transaction<T, F>(
        &self,
        isolation: IsolationLevel,
        mut op: F,
    ) -> SlashingProtectionResult<T>
    where
        F: FnMut(&Transaction<'_>) -> SlashingProtectionResult<T>,
    {
        self.retry.run(|| {
            let mut conn = self.pool.get()?;
            let tx = conn.transaction_with_behavior(isolation.behavior())?;
            let value = op(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    /// Run `op` once inside a read snapshot. Not retried, so `op` may have
    /// side effects outside the database (streaming output).
    pub fn with_snapshot<T, F>(&self, op: F) -> SlashingProtectionResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> SlashingProtectionResult<T>,
    {
        let mut conn = self.retry.run(|| self.pool.get())?;
        let tx = conn.transaction_with_behavior(IsolationLevel::Snapshot.behavior())?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

// =============================================================================
// ENCODING HELPERS
// =============================================================================

/// `u64` to SQLite `INTEGER`, rejecting values above `i64::MAX`.
pub(crate) fn to_sql_u64(field: &'static str, value: u64) -> SlashingProtectionResult<i64> {
    i64::try_from(value).map_err(|_| SlashingProtectionError::ValueOutOfRange { field, value })
}

pub(crate) fn from_sql_u64(field: &'static str, value: i64) -> SlashingProtectionResult<u64> {
    u64::try_from(value)
        .map_err(|_| SlashingProtectionError::CorruptData(format!("negative {field}: {value}")))
}

pub(crate) fn from_sql_opt_u64(
    field: &'static str,
    value: Option<i64>,
) -> SlashingProtectionResult<Option<u64>> {
    value.map(|v| from_sql_u64(field, v)).transpose()
}

pub(crate) fn root_from_sql(
    value: Option<Vec<u8>>,
) -> SlashingProtectionResult<Option<SigningRoot>> {
    value
        .map(|bytes| SigningRoot::from_slice(&bytes).map_err(SlashingProtectionError::from))
        .transpose()
}

pub(crate) fn root_to_sql(root: Option<&SigningRoot>) -> Option<&[u8]> {
    root.map(|r| r.as_bytes())
}
