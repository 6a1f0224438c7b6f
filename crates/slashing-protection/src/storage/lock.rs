//! Per-validator locks.
//!
//! SQLite has no advisory locks. A lock is taken by writing the validator's
//! sentinel row in `validator_locks` inside the caller's IMMEDIATE
//! transaction; the write lock is then held until commit or rollback, which
//! serialises every other locker of the same row.

use rusqlite::{params, Connection};

use crate::domain::ValidatorId;
use crate::error::SlashingProtectionResult;

/// Kind of history a lock protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockType {
    Block,
    Attestation,
}

impl LockType {
    const fn code(self) -> i64 {
        match self {
            Self::Block => 0,
            Self::Attestation => 1,
        }
    }
}

/// Take `lock_type` for `validator_id` for the rest of the transaction.
pub fn lock_for_validator(
    conn: &Connection,
    lock_type: LockType,
    validator_id: ValidatorId,
) -> SlashingProtectionResult<()> {
    conn.execute(
        "INSERT INTO validator_locks (lock_type, validator_id, generation) VALUES (?1, ?2, 1)
         ON CONFLICT (lock_type, validator_id) DO UPDATE SET generation = generation + 1",
        params![lock_type.code(), validator_id.0],
    )?;
    Ok(())
}

/// Take both the block and the attestation lock.
pub fn lock_all_for_validator(
    conn: &Connection,
    validator_id: ValidatorId,
) -> SlashingProtectionResult<()> {
    lock_for_validator(conn, LockType::Block, validator_id)?;
    lock_for_validator(conn, LockType::Attestation, validator_id)
}
