//! Schema migrations and the startup version check.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::info;

use crate::error::{SlashingProtectionError, SlashingProtectionResult};

/// Schema version this build reads and writes.
pub const EXPECTED_SCHEMA_VERSION: i64 = 3;

/// Ordered migrations; entry `n` upgrades version `n - 1` to `n`.
const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        "CREATE TABLE validators (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            public_key BLOB NOT NULL UNIQUE,
            enabled INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE signed_blocks (
            validator_id INTEGER NOT NULL REFERENCES validators(id),
            slot INTEGER NOT NULL,
            signing_root BLOB,
            UNIQUE (validator_id, slot)
        );
        CREATE TABLE signed_attestations (
            validator_id INTEGER NOT NULL REFERENCES validators(id),
            source_epoch INTEGER NOT NULL,
            target_epoch INTEGER NOT NULL,
            signing_root BLOB,
            UNIQUE (validator_id, target_epoch)
        );
        CREATE INDEX idx_signed_attestations_source
            ON signed_attestations (validator_id, source_epoch);
        CREATE TABLE metadata (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            genesis_validators_root BLOB NOT NULL
        );",
    ),
    (
        2,
        "CREATE TABLE low_watermarks (
            validator_id INTEGER PRIMARY KEY REFERENCES validators(id),
            slot INTEGER,
            source_epoch INTEGER,
            target_epoch INTEGER,
            CHECK ((source_epoch IS NULL) = (target_epoch IS NULL))
        );
        CREATE TABLE validator_locks (
            lock_type INTEGER NOT NULL,
            validator_id INTEGER NOT NULL REFERENCES validators(id),
            generation INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (lock_type, validator_id)
        );",
    ),
    (
        3,
        "ALTER TABLE metadata ADD COLUMN high_watermark_slot INTEGER;
        ALTER TABLE metadata ADD COLUMN high_watermark_epoch INTEGER;",
    ),
];

/// Live schema version, `None` for a database never migrated.
pub fn current_version(conn: &Connection) -> SlashingProtectionResult<Option<i64>> {
    let has_table: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'database_version')",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(None);
    }
    let version = conn
        .query_row("SELECT version FROM database_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(version)
}

/// Apply every pending migration in one transaction. Returns the new version.
pub fn migrate(conn: &mut Connection) -> SlashingProtectionResult<i64> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS database_version (version INTEGER NOT NULL);")?;
    let mut version = current_version(&tx)?.unwrap_or(0);
    if version > EXPECTED_SCHEMA_VERSION {
        return Err(SlashingProtectionError::SchemaVersionMismatch {
            expected: EXPECTED_SCHEMA_VERSION,
            found: Some(version),
        });
    }

    for (target, sql) in MIGRATIONS.iter().filter(move |(v, _)| *v > version) {
        tx.execute_batch(sql)?;
        version = *target;
        info!(version, "Applied slashing protection schema migration");
    }

    tx.execute("DELETE FROM database_version", [])?;
    tx.execute(
        "INSERT INTO database_version (version) VALUES (?1)",
        params![version],
    )?;
    tx.commit()?;
    Ok(version)
}

/// Fail unless the live schema is exactly [`EXPECTED_SCHEMA_VERSION`].
pub fn verify_version(conn: &Connection) -> SlashingProtectionResult<()> {
    let found = current_version(conn)?;
    if found != Some(EXPECTED_SCHEMA_VERSION) {
        return Err(SlashingProtectionError::SchemaVersionMismatch {
            expected: EXPECTED_SCHEMA_VERSION,
            found,
        });
    }
    Ok(())
}
