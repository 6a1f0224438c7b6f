//! Interchange import.
//!
//! The document is parsed and validated up front; a bad version, a foreign
//! genesis validators root or malformed hex aborts before any row is written.
//! Entries are then applied in one serializable transaction. Entries that
//! would conflict with existing history are logged and skipped, never
//! merged. Afterwards each validator's low watermark is raised to the lowest
//! value actually imported, never lowered.

use std::io::{BufReader, Read};
use std::sync::Arc;

use rusqlite::Connection;
use shared_types::{GenesisValidatorsRoot, PublicKey};
use tracing::{debug, info, warn};

use super::model::{InterchangeAttestation, InterchangeBlock, InterchangeV5, FORMAT_VERSION};
use crate::domain::watermark::best_of;
use crate::domain::{MinTracker, SignedAttestation, SignedBlock, ValidatorId};
use crate::error::{SlashingProtectionError, SlashingProtectionResult};
use crate::registry::RegisteredValidators;
use crate::storage::dao::{attestations, blocks, metadata, validators, watermarks};
use crate::storage::lock::lock_all_for_validator;
use crate::storage::{Database, IsolationLevel};

/// Counts of what an import did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub validators: usize,
    pub blocks_imported: usize,
    pub blocks_skipped: usize,
    pub attestations_imported: usize,
    pub attestations_skipped: usize,
}

pub struct InterchangeImporter {
    db: Arc<Database>,
    registered: Arc<RegisteredValidators>,
    network_root: Option<GenesisValidatorsRoot>,
}

impl InterchangeImporter {
    /// `network_root`, when set, is the root the running network uses; a
    /// document for any other network is rejected.
    pub fn new(
        db: Arc<Database>,
        registered: Arc<RegisteredValidators>,
        network_root: Option<GenesisValidatorsRoot>,
    ) -> Self {
        Self {
            db,
            registered,
            network_root,
        }
    }

    pub fn import<R: Read>(&self, input: R) -> SlashingProtectionResult<ImportSummary> {
        let document = parse(input)?;
        let document_root = document.metadata.genesis_validators_root;
        if let Some(expected) = self.network_root {
            if expected != document_root {
                return Err(SlashingProtectionError::GenesisValidatorsRootMismatch {
                    expected,
                    actual: document_root,
                });
            }
        }

        let summary = self.db.in_transaction(IsolationLevel::Serializable, |tx| {
            match metadata::find_genesis_validators_root(tx)? {
                Some(stored) if stored != document_root => {
                    return Err(SlashingProtectionError::GenesisValidatorsRootMismatch {
                        expected: stored,
                        actual: document_root,
                    });
                }
                Some(_) => {}
                None => metadata::insert_genesis_validators_root(tx, &document_root)?,
            }

            let mut summary = ImportSummary::default();
            for entry in &document.data {
                let validator = validators::insert_if_not_exists(tx, &entry.pubkey)?;
                lock_all_for_validator(tx, validator.id)?;
                let (imported, skipped) =
                    import_blocks(tx, validator.id, &entry.pubkey, &entry.signed_blocks)?;
                summary.blocks_imported += imported;
                summary.blocks_skipped += skipped;
                let (imported, skipped) = import_attestations(
                    tx,
                    validator.id,
                    &entry.pubkey,
                    &entry.signed_attestations,
                )?;
                summary.attestations_imported += imported;
                summary.attestations_skipped += skipped;
                summary.validators += 1;
            }
            Ok(summary)
        })?;

        let keys: Vec<PublicKey> = document.data.iter().map(|d| d.pubkey.clone()).collect();
        self.registered.register_validators(&keys)?;

        info!(
            validators = summary.validators,
            blocks_imported = summary.blocks_imported,
            blocks_skipped = summary.blocks_skipped,
            attestations_imported = summary.attestations_imported,
            attestations_skipped = summary.attestations_skipped,
            "Interchange import complete"
        );
        Ok(summary)
    }
}

/// Parse and validate the whole document.
fn parse<R: Read>(input: R) -> SlashingProtectionResult<InterchangeV5> {
    let document: InterchangeV5 = serde_json::from_reader(BufReader::new(input))
        .map_err(|e| SlashingProtectionError::InvalidInterchange(format!("malformed document: {e}")))?;
    let version = &document.metadata.interchange_format_version;
    if version != FORMAT_VERSION {
        return Err(SlashingProtectionError::InvalidInterchange(format!(
            "expecting interchange_format_version {FORMAT_VERSION}, got {version}"
        )));
    }
    Ok(document)
}

fn import_blocks(
    conn: &Connection,
    id: ValidatorId,
    public_key: &PublicKey,
    entries: &[InterchangeBlock],
) -> SlashingProtectionResult<(usize, usize)> {
    let mut min_slot = MinTracker::default();
    let (mut imported, mut skipped) = (0, 0);

    for (index, entry) in entries.iter().enumerate() {
        let existing = blocks::find_at_slot(conn, id, entry.slot)?;
        match (existing, entry.signing_root) {
            (Some(existing), root) if existing.signing_root == root => {
                debug!(%public_key, index, slot = entry.slot, "Block already exists, not imported");
                skipped += 1;
            }
            (Some(_), None) => {
                debug!(%public_key, index, slot = entry.slot, "Slot already recorded, not imported");
                skipped += 1;
            }
            (Some(_), Some(_)) => {
                warn!(%public_key, index, slot = entry.slot, "Block conflicts with an existing entry, not imported");
                skipped += 1;
            }
            (None, signing_root) => {
                blocks::insert(
                    conn,
                    &SignedBlock {
                        validator_id: id,
                        slot: entry.slot,
                        signing_root,
                    },
                )?;
                min_slot.track(entry.slot);
                imported += 1;
            }
        }
    }

    let existing = watermarks::find(conn, id)?.and_then(|w| w.slot);
    if let Some(slot) = best_of(min_slot.get(), existing) {
        if Some(slot) != existing {
            debug!(%public_key, slot, "Updating slot low watermark");
            watermarks::update_slot(conn, id, slot)?;
        }
    }
    Ok((imported, skipped))
}

fn import_attestations(
    conn: &Connection,
    id: ValidatorId,
    public_key: &PublicKey,
    entries: &[InterchangeAttestation],
) -> SlashingProtectionResult<(usize, usize)> {
    let mut min_source = MinTracker::default();
    let mut min_target = MinTracker::default();
    let (mut imported, mut skipped) = (0, 0);

    for (index, entry) in entries.iter().enumerate() {
        let (source, target) = (entry.source_epoch, entry.target_epoch);
        if let Some(reason) = attestation_conflict(conn, id, entry)? {
            match reason {
                SkipReason::Duplicate => {
                    debug!(%public_key, index, source, target, "Attestation already exists, not imported")
                }
                SkipReason::Conflict(what) => {
                    warn!(%public_key, index, source, target, "Attestation {what}, not imported")
                }
            }
            skipped += 1;
            continue;
        }

        attestations::upsert(
            conn,
            &SignedAttestation {
                validator_id: id,
                source_epoch: source,
                target_epoch: target,
                signing_root: entry.signing_root,
            },
        )?;
        min_source.track(source);
        min_target.track(target);
        imported += 1;
    }

    let existing = watermarks::find(conn, id)?.and_then(|w| w.epochs());
    let new_source = best_of(min_source.get(), existing.map(|e| e.0));
    let new_target = best_of(min_target.get(), existing.map(|e| e.1));
    match (new_source, new_target) {
        (Some(source), Some(target)) => {
            if Some((source, target)) != existing {
                debug!(%public_key, source, target, "Updating epoch low watermark");
                watermarks::update_epochs(conn, id, source, target)?;
            }
        }
        (None, None) => {}
        _ => {
            return Err(SlashingProtectionError::InconsistentWatermark(format!(
                "no existing attestation watermark for {public_key}, and import only sets one epoch"
            )))
        }
    }
    Ok((imported, skipped))
}

enum SkipReason {
    Duplicate,
    Conflict(&'static str),
}

fn attestation_conflict(
    conn: &Connection,
    id: ValidatorId,
    entry: &InterchangeAttestation,
) -> SlashingProtectionResult<Option<SkipReason>> {
    let (source, target) = (entry.source_epoch, entry.target_epoch);
    if source > target {
        return Ok(Some(SkipReason::Conflict(
            "has source greater than target epoch",
        )));
    }
    if let Some(existing) = attestations::find_at_target(conn, id, target)? {
        return Ok(Some(match (existing.signing_root, entry.signing_root) {
            (stored, imported) if stored == imported => SkipReason::Duplicate,
            (_, None) => SkipReason::Duplicate,
            _ => SkipReason::Conflict("conflicts with an existing entry"),
        }));
    }
    if attestations::find_surrounding(conn, id, source, target)?.is_some() {
        return Ok(Some(SkipReason::Conflict("is surrounded by existing entries")));
    }
    if attestations::find_surrounded(conn, id, source, target)?.is_some() {
        return Ok(Some(SkipReason::Conflict("surrounds an existing entry")));
    }
    Ok(None)
}
