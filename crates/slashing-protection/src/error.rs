//! Error types for the slashing protection database

use std::time::Duration;

use rusqlite::ErrorCode;
use shared_types::{Bytes32, PublicKey, TypeError};
use thiserror::Error;

/// Slashing-protection errors.
///
/// None of these ever reach a signing caller: the decision engine folds every
/// error into a deny.
#[derive(Debug, Error)]
pub enum SlashingProtectionError {
    /// Underlying SQLite failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O failure (export target, import source, database directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Interchange document could not be (de)serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Live schema is not the version this build expects. Fatal at startup.
    #[error("Schema version mismatch: expected {expected}, found {found:?}")]
    SchemaVersionMismatch { expected: i64, found: Option<i64> },

    /// Public key has never been registered.
    #[error("Unregistered validator for {0}")]
    UnregisteredValidator(PublicKey),

    /// No pooled connection became available in time.
    #[error("Timed out after {0:?} waiting for a database connection")]
    PoolTimeout(Duration),

    /// Transient failures persisted through every retry.
    #[error("Transaction max retries {max_retries} reached: {last_error}")]
    RetriesExhausted {
        max_retries: u32,
        last_error: Box<SlashingProtectionError>,
    },

    /// Interchange document is structurally or semantically invalid.
    #[error("Invalid interchange: {0}")]
    InvalidInterchange(String),

    /// Supplied genesis validators root differs from the stored one.
    #[error("Genesis validators root mismatch: expected {expected}, got {actual}")]
    GenesisValidatorsRootMismatch { expected: Bytes32, actual: Bytes32 },

    /// A watermark update would leave the table in an inconsistent state.
    #[error("Inconsistent watermark: {0}")]
    InconsistentWatermark(String),

    /// Caller supplied an unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Value cannot be represented in the storage encoding.
    #[error("Value out of range for {field}: {value}")]
    ValueOutOfRange { field: &'static str, value: u64 },

    /// Stored row could not be decoded.
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// Shared type construction failed.
    #[error("Type error: {0}")]
    Type(#[from] TypeError),
}

impl SlashingProtectionError {
    /// Whether the failure is transient and the transaction may be retried.
    ///
    /// Busy/locked database results and pool exhaustion are transient;
    /// everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            Self::PoolTimeout(_) => true,
            _ => false,
        }
    }
}

/// Result type for slashing-protection operations.
pub type SlashingProtectionResult<T> = Result<T, SlashingProtectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: std::os::raw::c_int) -> SlashingProtectionError {
        SlashingProtectionError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            None,
        ))
    }

    #[test]
    fn test_busy_and_locked_are_retryable() {
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_BUSY).is_retryable());
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED).is_retryable());
        assert!(SlashingProtectionError::PoolTimeout(Duration::from_millis(1)).is_retryable());
    }

    #[test]
    fn test_constraint_violation_is_not_retryable() {
        assert!(!sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT).is_retryable());
        assert!(!SlashingProtectionError::InvalidArgument("x".into()).is_retryable());
    }

    #[test]
    fn test_unregistered_message_names_key() {
        let key = PublicKey::from_bytes(vec![1, 2]).unwrap();
        assert_eq!(
            SlashingProtectionError::UnregisteredValidator(key).to_string(),
            "Unregistered validator for 0x0102"
        );
    }
}
