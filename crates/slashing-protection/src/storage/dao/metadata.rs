//! `metadata` singleton row: genesis validators root and high watermark.

use rusqlite::{params, Connection, OptionalExtension};
use shared_types::GenesisValidatorsRoot;

use crate::domain::HighWatermark;
use crate::error::{SlashingProtectionError, SlashingProtectionResult};
use crate::storage::{from_sql_opt_u64, to_sql_u64};

const METADATA_ID: i64 = 0;

pub fn find_genesis_validators_root(
    conn: &Connection,
) -> SlashingProtectionResult<Option<GenesisValidatorsRoot>> {
    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT genesis_validators_root FROM metadata WHERE id = ?1",
            params![METADATA_ID],
            |row| row.get(0),
        )
        .optional()?;
    bytes
        .map(|b| GenesisValidatorsRoot::from_slice(&b).map_err(SlashingProtectionError::from))
        .transpose()
}

pub fn insert_genesis_validators_root(
    conn: &Connection,
    root: &GenesisValidatorsRoot,
) -> SlashingProtectionResult<()> {
    conn.execute(
        "INSERT INTO metadata (id, genesis_validators_root) VALUES (?1, ?2)",
        params![METADATA_ID, root.as_bytes()],
    )?;
    Ok(())
}

pub fn find_high_watermark(conn: &Connection) -> SlashingProtectionResult<Option<HighWatermark>> {
    let row: Option<(Option<i64>, Option<i64>)> = conn
        .query_row(
            "SELECT high_watermark_slot, high_watermark_epoch FROM metadata WHERE id = ?1",
            params![METADATA_ID],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((slot, epoch)) = row else {
        return Ok(None);
    };
    let high = HighWatermark {
        slot: from_sql_opt_u64("high_watermark_slot", slot)?,
        epoch: from_sql_opt_u64("high_watermark_epoch", epoch)?,
    };
    Ok((!high.is_empty()).then_some(high))
}

/// Requires the metadata row (genesis validators root) to exist.
pub fn update_high_watermark(
    conn: &Connection,
    high: &HighWatermark,
) -> SlashingProtectionResult<()> {
    let slot = high.slot.map(|s| to_sql_u64("high_watermark_slot", s)).transpose()?;
    let epoch = high
        .epoch
        .map(|e| to_sql_u64("high_watermark_epoch", e))
        .transpose()?;
    let changed = conn.execute(
        "UPDATE metadata SET high_watermark_slot = ?2, high_watermark_epoch = ?3 WHERE id = ?1",
        params![METADATA_ID, slot, epoch],
    )?;
    if changed == 0 {
        return Err(SlashingProtectionError::InvalidArgument(
            "genesis validators root must be set before a high watermark".into(),
        ));
    }
    Ok(())
}

pub fn delete_high_watermark(conn: &Connection) -> SlashingProtectionResult<()> {
    conn.execute(
        "UPDATE metadata SET high_watermark_slot = NULL, high_watermark_epoch = NULL WHERE id = ?1",
        params![METADATA_ID],
    )?;
    Ok(())
}
