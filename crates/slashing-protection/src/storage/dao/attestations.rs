//! `signed_attestations` table.

use rusqlite::{params, Connection, OptionalExtension, Row};
use shared_types::Epoch;

use crate::domain::{SignedAttestation, ValidatorId};
use crate::error::SlashingProtectionResult;
use crate::storage::{from_sql_u64, root_from_sql, root_to_sql, to_sql_u64};

const COLUMNS: &str = "source_epoch, target_epoch, signing_root";

type RawAttestation = (i64, i64, Option<Vec<u8>>);

fn raw(row: &Row<'_>) -> rusqlite::Result<RawAttestation> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode(
    validator_id: ValidatorId,
    (source, target, root): RawAttestation,
) -> SlashingProtectionResult<SignedAttestation> {
    Ok(SignedAttestation {
        validator_id,
        source_epoch: from_sql_u64("source_epoch", source)?,
        target_epoch: from_sql_u64("target_epoch", target)?,
        signing_root: root_from_sql(root)?,
    })
}

fn find_one(
    conn: &Connection,
    validator_id: ValidatorId,
    predicate: &str,
    source: Epoch,
    target: Epoch,
) -> SlashingProtectionResult<Option<SignedAttestation>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM signed_attestations WHERE validator_id = ?1 AND {predicate} LIMIT 1"
    );
    let row = conn
        .query_row(
            &sql,
            params![
                validator_id.0,
                to_sql_u64("source_epoch", source)?,
                to_sql_u64("target_epoch", target)?
            ],
            raw,
        )
        .optional()?;
    row.map(|r| decode(validator_id, r)).transpose()
}

pub fn find_at_target(
    conn: &Connection,
    validator_id: ValidatorId,
    target: Epoch,
) -> SlashingProtectionResult<Option<SignedAttestation>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM signed_attestations WHERE validator_id = ?1 AND target_epoch = ?2"
    );
    let row = conn
        .query_row(
            &sql,
            params![validator_id.0, to_sql_u64("target_epoch", target)?],
            raw,
        )
        .optional()?;
    row.map(|r| decode(validator_id, r)).transpose()
}

/// Any record that strictly surrounds `(source, target)`.
pub fn find_surrounding(
    conn: &Connection,
    validator_id: ValidatorId,
    source: Epoch,
    target: Epoch,
) -> SlashingProtectionResult<Option<SignedAttestation>> {
    find_one(
        conn,
        validator_id,
        "source_epoch < ?2 AND target_epoch > ?3",
        source,
        target,
    )
}

/// Any record strictly surrounded by `(source, target)`.
pub fn find_surrounded(
    conn: &Connection,
    validator_id: ValidatorId,
    source: Epoch,
    target: Epoch,
) -> SlashingProtectionResult<Option<SignedAttestation>> {
    find_one(
        conn,
        validator_id,
        "source_epoch > ?2 AND target_epoch < ?3",
        source,
        target,
    )
}

/// Insert, replacing any row at the same target epoch.
pub fn upsert(conn: &Connection, attestation: &SignedAttestation) -> SlashingProtectionResult<()> {
    conn.execute(
        "INSERT INTO signed_attestations (validator_id, source_epoch, target_epoch, signing_root)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (validator_id, target_epoch)
         DO UPDATE SET source_epoch = excluded.source_epoch, signing_root = excluded.signing_root",
        params![
            attestation.validator_id.0,
            to_sql_u64("source_epoch", attestation.source_epoch)?,
            to_sql_u64("target_epoch", attestation.target_epoch)?,
            root_to_sql(attestation.signing_root.as_ref())
        ],
    )?;
    Ok(())
}

pub fn max_target(conn: &Connection, validator_id: ValidatorId) -> SlashingProtectionResult<Option<Epoch>> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(target_epoch) FROM signed_attestations WHERE validator_id = ?1",
        params![validator_id.0],
        |row| row.get(0),
    )?;
    max.map(|v| from_sql_u64("target_epoch", v)).transpose()
}

/// Oldest record with `target_epoch >= target`.
pub fn find_nearest_from_target(
    conn: &Connection,
    validator_id: ValidatorId,
    target: Epoch,
) -> SlashingProtectionResult<Option<SignedAttestation>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM signed_attestations
         WHERE validator_id = ?1 AND target_epoch >= ?2 ORDER BY target_epoch LIMIT 1"
    );
    let row = conn
        .query_row(
            &sql,
            params![validator_id.0, to_sql_u64("target_epoch", target)?],
            raw,
        )
        .optional()?;
    row.map(|r| decode(validator_id, r)).transpose()
}

/// Highest source epoch among records with `target_epoch < target`.
pub fn max_source_below_target(
    conn: &Connection,
    validator_id: ValidatorId,
    target: Epoch,
) -> SlashingProtectionResult<Option<Epoch>> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(source_epoch) FROM signed_attestations
         WHERE validator_id = ?1 AND target_epoch < ?2",
        params![validator_id.0, to_sql_u64("target_epoch", target)?],
        |row| row.get(0),
    )?;
    max.map(|v| from_sql_u64("source_epoch", v)).transpose()
}

/// Delete rows with `target_epoch < below`. Returns the number removed.
pub fn delete_below_target(
    conn: &Connection,
    validator_id: ValidatorId,
    below: Epoch,
) -> SlashingProtectionResult<usize> {
    Ok(conn.execute(
        "DELETE FROM signed_attestations WHERE validator_id = ?1 AND target_epoch < ?2",
        params![validator_id.0, to_sql_u64("target_epoch", below)?],
    )?)
}

pub fn count(conn: &Connection, validator_id: ValidatorId) -> SlashingProtectionResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM signed_attestations WHERE validator_id = ?1",
        params![validator_id.0],
        |row| row.get(0),
    )?;
    from_sql_u64("count", count)
}

/// Stream rows with `source_epoch >= source AND target_epoch >= target` in
/// target order.
pub fn for_each_from<F>(
    conn: &Connection,
    validator_id: ValidatorId,
    source: Epoch,
    target: Epoch,
    mut visit: F,
) -> SlashingProtectionResult<()>
where
    F: FnMut(SignedAttestation) -> SlashingProtectionResult<()>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM signed_attestations
         WHERE validator_id = ?1 AND source_epoch >= ?2 AND target_epoch >= ?3
         ORDER BY target_epoch"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![
        validator_id.0,
        to_sql_u64("source_epoch", source)?,
        to_sql_u64("target_epoch", target)?
    ])?;
    while let Some(row) = rows.next()? {
        visit(decode(validator_id, raw(row)?)?)?;
    }
    Ok(())
}
