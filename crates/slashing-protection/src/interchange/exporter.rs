//! Interchange export.

use std::io::Write;
use std::sync::Arc;

use rusqlite::Connection;
use shared_types::PublicKey;
use tracing::{debug, info, warn};

use super::model::{InterchangeAttestation, InterchangeBlock};
use super::writer::InterchangeWriter;
use crate::domain::Validator;
use crate::error::{SlashingProtectionError, SlashingProtectionResult};
use crate::storage::dao::{attestations, blocks, metadata, validators, watermarks};
use crate::storage::Database;

/// Exports validators one at a time into a single document.
///
/// Open with [`IncrementalExporter::open`], call [`IncrementalExporter::export`]
/// per public key, then [`IncrementalExporter::finalise`]. Each validator is
/// read inside its own snapshot transaction.
pub struct IncrementalExporter<W: Write> {
    db: Arc<Database>,
    writer: InterchangeWriter<W>,
    exported: usize,
}

impl<W: Write> IncrementalExporter<W> {
    /// Start a document. Fails when no genesis validators root is stored.
    pub fn open(db: Arc<Database>, out: W) -> SlashingProtectionResult<Self> {
        let root = db
            .with_snapshot(|tx| metadata::find_genesis_validators_root(tx))?
            .ok_or_else(|| {
                SlashingProtectionError::InvalidInterchange(
                    "no genesis validators root stored, nothing to export".into(),
                )
            })?;
        Ok(Self {
            db,
            writer: InterchangeWriter::start(out, &root)?,
            exported: 0,
        })
    }

    /// Append one validator. Unknown keys are skipped with a warning.
    pub fn export(&mut self, public_key: &PublicKey) -> SlashingProtectionResult<()> {
        let db = Arc::clone(&self.db);
        let writer = &mut self.writer;
        let written = db.with_snapshot(|tx| {
            let Some(validator) = validators::find_by_public_key(tx, public_key)? else {
                warn!(%public_key, "No slashing protection data for validator, skipping export");
                return Ok(false);
            };
            write_validator(tx, &validator, writer)?;
            Ok(true)
        })?;
        if written {
            self.exported += 1;
        }
        Ok(())
    }

    /// Close the document and return the sink.
    pub fn finalise(self) -> SlashingProtectionResult<W> {
        info!(validators = self.exported, "Interchange export complete");
        self.writer.finish()
    }
}

/// Export every validator in the database, or only `filter` when given.
pub fn export_all<W: Write>(
    db: Arc<Database>,
    out: W,
    filter: Option<&[PublicKey]>,
) -> SlashingProtectionResult<W> {
    let keys: Vec<PublicKey> = match filter {
        Some(keys) => keys.to_vec(),
        None => db
            .with_snapshot(|tx| validators::find_all(tx))?
            .into_iter()
            .map(|v| v.public_key)
            .collect(),
    };
    let mut exporter = IncrementalExporter::open(db, out)?;
    for key in &keys {
        exporter.export(key)?;
    }
    exporter.finalise()
}

/// Stream one validator's history at or above its low watermark.
fn write_validator<W: Write>(
    conn: &Connection,
    validator: &Validator,
    writer: &mut InterchangeWriter<W>,
) -> SlashingProtectionResult<()> {
    let public_key = &validator.public_key;
    let watermark = watermarks::find(conn, validator.id)?;
    if watermark.is_none() {
        warn!(%public_key, "No low watermark available, producing empty export for validator");
    }
    info!(%public_key, "Exporting entries for validator");

    writer.begin_validator(public_key)?;
    match watermark.and_then(|w| w.slot) {
        Some(slot) => blocks::for_each_from(conn, validator.id, slot, |block| {
            writer.write_block(&InterchangeBlock {
                slot: block.slot,
                signing_root: block.signing_root,
            })
        })?,
        None => debug!(%public_key, "No block slot low watermark, producing empty block listing"),
    }

    writer.begin_attestations()?;
    match watermark.and_then(|w| w.epochs()) {
        Some((source, target)) => {
            attestations::for_each_from(conn, validator.id, source, target, |attestation| {
                writer.write_attestation(&InterchangeAttestation {
                    source_epoch: attestation.source_epoch,
                    target_epoch: attestation.target_epoch,
                    signing_root: attestation.signing_root,
                })
            })?
        }
        None => debug!(
            %public_key,
            "No attestation low watermark, producing empty attestation listing"
        ),
    }
    writer.end_validator()
}
