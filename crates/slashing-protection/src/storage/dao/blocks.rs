//! `signed_blocks` table.

use rusqlite::{params, Connection, OptionalExtension};
use shared_types::Slot;

use crate::domain::{SignedBlock, ValidatorId};
use crate::error::SlashingProtectionResult;
use crate::storage::{from_sql_u64, root_from_sql, root_to_sql, to_sql_u64};

pub fn find_at_slot(
    conn: &Connection,
    validator_id: ValidatorId,
    slot: Slot,
) -> SlashingProtectionResult<Option<SignedBlock>> {
    let root = conn
        .query_row(
            "SELECT signing_root FROM signed_blocks WHERE validator_id = ?1 AND slot = ?2",
            params![validator_id.0, to_sql_u64("slot", slot)?],
            |row| row.get::<_, Option<Vec<u8>>>(0),
        )
        .optional()?;
    root.map(|root| {
        Ok(SignedBlock {
            validator_id,
            slot,
            signing_root: root_from_sql(root)?,
        })
    })
    .transpose()
}

pub fn insert(conn: &Connection, block: &SignedBlock) -> SlashingProtectionResult<()> {
    conn.execute(
        "INSERT INTO signed_blocks (validator_id, slot, signing_root) VALUES (?1, ?2, ?3)",
        params![
            block.validator_id.0,
            to_sql_u64("slot", block.slot)?,
            root_to_sql(block.signing_root.as_ref())
        ],
    )?;
    Ok(())
}

pub fn max_slot(conn: &Connection, validator_id: ValidatorId) -> SlashingProtectionResult<Option<Slot>> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(slot) FROM signed_blocks WHERE validator_id = ?1",
        params![validator_id.0],
        |row| row.get(0),
    )?;
    max.map(|v| from_sql_u64("slot", v)).transpose()
}

/// Delete rows with `slot < below`. Returns the number removed.
pub fn delete_below(
    conn: &Connection,
    validator_id: ValidatorId,
    below: Slot,
) -> SlashingProtectionResult<usize> {
    Ok(conn.execute(
        "DELETE FROM signed_blocks WHERE validator_id = ?1 AND slot < ?2",
        params![validator_id.0, to_sql_u64("slot", below)?],
    )?)
}

pub fn count(conn: &Connection, validator_id: ValidatorId) -> SlashingProtectionResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM signed_blocks WHERE validator_id = ?1",
        params![validator_id.0],
        |row| row.get(0),
    )?;
    from_sql_u64("count", count)
}

/// Stream rows with `slot >= from` in slot order.
pub fn for_each_from<F>(
    conn: &Connection,
    validator_id: ValidatorId,
    from: Slot,
    mut visit: F,
) -> SlashingProtectionResult<()>
where
    F: FnMut(SignedBlock) -> SlashingProtectionResult<()>,
{
    let mut stmt = conn.prepare(
        "SELECT slot, signing_root FROM signed_blocks
         WHERE validator_id = ?1 AND slot >= ?2 ORDER BY slot",
    )?;
    let mut rows = stmt.query(params![validator_id.0, to_sql_u64("slot", from)?])?;
    while let Some(row) = rows.next()? {
        visit(SignedBlock {
            validator_id,
            slot: from_sql_u64("slot", row.get(0)?)?,
            signing_root: root_from_sql(row.get(1)?)?,
        })?;
    }
    Ok(())
}
