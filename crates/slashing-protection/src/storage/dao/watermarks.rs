//! `low_watermarks` table.
//!
//! Updates are guarded in SQL so a stored watermark can never move backwards;
//! an attempted regression is reported as `InconsistentWatermark`.

use rusqlite::{params, Connection, OptionalExtension};
use shared_types::{Epoch, Slot};

use crate::domain::{SigningWatermark, ValidatorId};
use crate::error::{SlashingProtectionError, SlashingProtectionResult};
use crate::storage::{from_sql_opt_u64, to_sql_u64};

pub fn find(
    conn: &Connection,
    validator_id: ValidatorId,
) -> SlashingProtectionResult<Option<SigningWatermark>> {
    let row = conn
        .query_row(
            "SELECT slot, source_epoch, target_epoch FROM low_watermarks WHERE validator_id = ?1",
            params![validator_id.0],
            |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )
        .optional()?;
    row.map(|(slot, source, target)| {
        Ok(SigningWatermark {
            validator_id,
            slot: from_sql_opt_u64("slot", slot)?,
            source_epoch: from_sql_opt_u64("source_epoch", source)?,
            target_epoch: from_sql_opt_u64("target_epoch", target)?,
        })
    })
    .transpose()
}

pub fn update_slot(
    conn: &Connection,
    validator_id: ValidatorId,
    slot: Slot,
) -> SlashingProtectionResult<()> {
    let changed = conn.execute(
        "INSERT INTO low_watermarks (validator_id, slot) VALUES (?1, ?2)
         ON CONFLICT (validator_id) DO UPDATE SET slot = excluded.slot
         WHERE low_watermarks.slot IS NULL OR excluded.slot >= low_watermarks.slot",
        params![validator_id.0, to_sql_u64("slot", slot)?],
    )?;
    if changed == 0 {
        return Err(SlashingProtectionError::InconsistentWatermark(format!(
            "slot watermark for validator {validator_id} cannot move back to {slot}"
        )));
    }
    Ok(())
}

pub fn update_epochs(
    conn: &Connection,
    validator_id: ValidatorId,
    source: Epoch,
    target: Epoch,
) -> SlashingProtectionResult<()> {
    let changed = conn.execute(
        "INSERT INTO low_watermarks (validator_id, source_epoch, target_epoch) VALUES (?1, ?2, ?3)
         ON CONFLICT (validator_id) DO UPDATE
         SET source_epoch = excluded.source_epoch, target_epoch = excluded.target_epoch
         WHERE low_watermarks.source_epoch IS NULL
            OR (excluded.source_epoch >= low_watermarks.source_epoch
                AND excluded.target_epoch >= low_watermarks.target_epoch)",
        params![
            validator_id.0,
            to_sql_u64("source_epoch", source)?,
            to_sql_u64("target_epoch", target)?
        ],
    )?;
    if changed == 0 {
        return Err(SlashingProtectionError::InconsistentWatermark(format!(
            "epoch watermark for validator {validator_id} cannot move back to ({source}, {target})"
        )));
    }
    Ok(())
}

/// Highest low watermark across all validators: `(max slot, max epoch)`,
/// where the epoch is the larger of source and target.
pub fn max_across_validators(
    conn: &Connection,
) -> SlashingProtectionResult<(Option<Slot>, Option<Epoch>)> {
    let (slot, epoch): (Option<i64>, Option<i64>) = conn.query_row(
        "SELECT MAX(slot), MAX(MAX(source_epoch, target_epoch)) FROM low_watermarks",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((
        from_sql_opt_u64("slot", slot)?,
        from_sql_opt_u64("epoch", epoch)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema;

    fn conn_with_validator() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        schema::migrate(&mut conn).unwrap();
        conn.execute("INSERT INTO validators (public_key) VALUES (x'01')", [])
            .unwrap();
        conn
    }

    #[test]
    fn test_missing_watermark_is_none() {
        let conn = conn_with_validator();
        assert_eq!(find(&conn, ValidatorId(1)).unwrap(), None);
    }

    #[test]
    fn test_slot_and_epochs_are_independent() {
        let conn = conn_with_validator();
        update_slot(&conn, ValidatorId(1), 10).unwrap();
        let wm = find(&conn, ValidatorId(1)).unwrap().unwrap();
        assert_eq!(wm.slot, Some(10));
        assert_eq!(wm.epochs(), None);

        update_epochs(&conn, ValidatorId(1), 2, 3).unwrap();
        let wm = find(&conn, ValidatorId(1)).unwrap().unwrap();
        assert_eq!(wm.slot, Some(10));
        assert_eq!(wm.epochs(), Some((2, 3)));
    }

    #[test]
    fn test_cannot_move_backwards() {
        let conn = conn_with_validator();
        update_slot(&conn, ValidatorId(1), 10).unwrap();
        assert!(matches!(
            update_slot(&conn, ValidatorId(1), 9),
            Err(SlashingProtectionError::InconsistentWatermark(_))
        ));
        update_slot(&conn, ValidatorId(1), 10).unwrap();

        update_epochs(&conn, ValidatorId(1), 4, 5).unwrap();
        assert!(update_epochs(&conn, ValidatorId(1), 3, 6).is_err());
        assert!(update_epochs(&conn, ValidatorId(1), 4, 4).is_err());
        assert_eq!(
            find(&conn, ValidatorId(1)).unwrap().unwrap().epochs(),
            Some((4, 5))
        );
    }

    #[test]
    fn test_max_across_validators() {
        let conn = conn_with_validator();
        conn.execute("INSERT INTO validators (public_key) VALUES (x'02')", [])
            .unwrap();
        update_slot(&conn, ValidatorId(1), 10).unwrap();
        update_epochs(&conn, ValidatorId(2), 7, 9).unwrap();
        assert_eq!(max_across_validators(&conn).unwrap(), (Some(10), Some(9)));
    }
}
