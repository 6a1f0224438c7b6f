//! `validators` table.

use rusqlite::{params, Connection, OptionalExtension};
use shared_types::PublicKey;

use crate::domain::{Validator, ValidatorId};
use crate::error::SlashingProtectionResult;

fn decode(id: i64, public_key: Vec<u8>, enabled: bool) -> SlashingProtectionResult<Validator> {
    Ok(Validator {
        id: ValidatorId(id),
        public_key: PublicKey::from_bytes(public_key)?,
        enabled,
    })
}

/// Insert the key unless present; returns the validator either way.
pub fn insert_if_not_exists(
    conn: &Connection,
    public_key: &PublicKey,
) -> SlashingProtectionResult<Validator> {
    conn.execute(
        "INSERT INTO validators (public_key) VALUES (?1) ON CONFLICT (public_key) DO NOTHING",
        params![public_key.as_bytes()],
    )?;
    let (id, enabled): (i64, bool) = conn.query_row(
        "SELECT id, enabled FROM validators WHERE public_key = ?1",
        params![public_key.as_bytes()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(Validator {
        id: ValidatorId(id),
        public_key: public_key.clone(),
        enabled,
    })
}

pub fn find_all(conn: &Connection) -> SlashingProtectionResult<Vec<Validator>> {
    let mut stmt = conn.prepare("SELECT id, public_key, enabled FROM validators ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<(i64, Vec<u8>, bool)>, _>>()?;
    rows.into_iter()
        .map(|(id, key, enabled)| decode(id, key, enabled))
        .collect()
}

pub fn find_by_public_key(
    conn: &Connection,
    public_key: &PublicKey,
) -> SlashingProtectionResult<Option<Validator>> {
    let row = conn
        .query_row(
            "SELECT id, enabled FROM validators WHERE public_key = ?1",
            params![public_key.as_bytes()],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?)),
        )
        .optional()?;
    Ok(row.map(|(id, enabled)| Validator {
        id: ValidatorId(id),
        public_key: public_key.clone(),
        enabled,
    }))
}

/// Whether the validator may sign. A missing row counts as disabled.
pub fn is_enabled(conn: &Connection, id: ValidatorId) -> SlashingProtectionResult<bool> {
    let enabled = conn
        .query_row(
            "SELECT enabled FROM validators WHERE id = ?1",
            params![id.0],
            |row| row.get(0),
        )
        .optional()?;
    Ok(enabled.unwrap_or(false))
}

pub fn set_enabled(conn: &Connection, id: ValidatorId, enabled: bool) -> SlashingProtectionResult<()> {
    conn.execute(
        "UPDATE validators SET enabled = ?2 WHERE id = ?1",
        params![id.0, enabled],
    )?;
    Ok(())
}
