//! # Pruner
//!
//! Bounds history growth without weakening protection.
//!
//! For each registered validator, under its block and attestation locks:
//!
//! 1. **Move watermarks** (one transaction): the slot watermark becomes
//!    `max(existing, max_slot - slots_to_keep + 1)`; the target-epoch
//!    watermark `max(existing, max_target - epochs_to_keep + 1)`; the source
//!    epoch moves with it (see [`DbPruner::prune_validator`]).
//! 2. **Delete** (second transaction): blocks below the slot watermark and
//!    attestations below the target-epoch watermark.
//!
//! A crash between the two phases leaves a watermark that is ahead of the
//! data, which only makes signing more conservative; the next pass deletes.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::PruningConfig;
use crate::domain::watermark::{advance, prune_candidate};
use crate::domain::{SigningWatermark, ValidatorId};
use crate::error::{SlashingProtectionError, SlashingProtectionResult};
use crate::registry::RegisteredValidators;
use crate::storage::dao::{attestations, blocks, watermarks};
use crate::storage::lock::lock_all_for_validator;
use crate::storage::{Database, IsolationLevel};

/// Outcome of a pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub validators: usize,
    pub blocks_deleted: usize,
    pub attestations_deleted: usize,
    /// Validators whose pass failed; retried on the next run.
    pub failed: usize,
}

/// Rows removed for one validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidatorPruneResult {
    pub blocks_deleted: usize,
    pub attestations_deleted: usize,
}

/// Database-backed pruner.
pub struct DbPruner {
    db: Arc<Database>,
    registered: Arc<RegisteredValidators>,
    epochs_to_keep: u64,
    slots_to_keep: u64,
}

impl DbPruner {
    pub fn new(
        db: Arc<Database>,
        registered: Arc<RegisteredValidators>,
        epochs_to_keep: u64,
        slots_per_epoch: u64,
    ) -> SlashingProtectionResult<Self> {
        if epochs_to_keep == 0 || slots_per_epoch == 0 {
            return Err(SlashingProtectionError::InvalidArgument(format!(
                "epochs_to_keep ({epochs_to_keep}) and slots_per_epoch ({slots_per_epoch}) must be positive"
            )));
        }
        let slots_to_keep = epochs_to_keep.checked_mul(slots_per_epoch).ok_or_else(|| {
            SlashingProtectionError::InvalidArgument(format!(
                "epochs_to_keep * slots_per_epoch overflows ({epochs_to_keep} * {slots_per_epoch})"
            ))
        })?;
        Ok(Self {
            db,
            registered,
            epochs_to_keep,
            slots_to_keep,
        })
    }

    pub fn from_config(
        db: Arc<Database>,
        registered: Arc<RegisteredValidators>,
        config: &PruningConfig,
    ) -> SlashingProtectionResult<Self> {
        Self::new(db, registered, config.epochs_to_keep, config.slots_per_epoch)
    }

    /// Prune every registered validator. Per-validator failures are logged
    /// and counted; the pass continues.
    pub fn prune(&self) -> PruneSummary {
        let mut ids: Vec<ValidatorId> = self.registered.all_validator_ids().into_iter().collect();
        ids.sort_unstable();
        info!(
            validators = ids.len(),
            epochs_to_keep = self.epochs_to_keep,
            slots_to_keep = self.slots_to_keep,
            "Pruning slashing protection database"
        );

        let mut summary = PruneSummary::default();
        for id in ids {
            match self.prune_validator(id) {
                Ok(result) => {
                    summary.validators += 1;
                    summary.blocks_deleted += result.blocks_deleted;
                    summary.attestations_deleted += result.attestations_deleted;
                }
                Err(err) => {
                    warn!(validator_id = %id, error = %err, "Pruning failed for validator");
                    summary.failed += 1;
                }
            }
        }

        info!(
            validators = summary.validators,
            blocks_deleted = summary.blocks_deleted,
            attestations_deleted = summary.attestations_deleted,
            failed = summary.failed,
            "Pruning complete"
        );
        summary
    }

    /// Prune one validator.
    ///
    /// The source-epoch watermark becomes the maximum of its existing value,
    /// the highest source among attestations about to be deleted (so no new
    /// vote can surround a pruned one) and the source of the oldest retained
    /// attestation.
    pub fn prune_validator(&self, id: ValidatorId) -> SlashingProtectionResult<ValidatorPruneResult> {
        let watermark = self.db.in_transaction(IsolationLevel::Serializable, |tx| {
            lock_all_for_validator(tx, id)?;
            self.move_watermarks(tx, id)
        })?;

        let Some(watermark) = watermark else {
            debug!(validator_id = %id, "No signing history, nothing to prune");
            return Ok(ValidatorPruneResult::default());
        };

        let result = self.db.in_transaction(IsolationLevel::Serializable, |tx| {
            lock_all_for_validator(tx, id)?;
            let blocks_deleted = match watermark.slot {
                Some(slot) => blocks::delete_below(tx, id, slot)?,
                None => 0,
            };
            let attestations_deleted = match watermark.target_epoch {
                Some(target) => attestations::delete_below_target(tx, id, target)?,
                None => 0,
            };
            Ok(ValidatorPruneResult {
                blocks_deleted,
                attestations_deleted,
            })
        })?;

        debug!(
            validator_id = %id,
            slot = ?watermark.slot,
            source_epoch = ?watermark.source_epoch,
            target_epoch = ?watermark.target_epoch,
            blocks_deleted = result.blocks_deleted,
            attestations_deleted = result.attestations_deleted,
            "Pruned validator"
        );
        Ok(result)
    }

    fn move_watermarks(
        &self,
        conn: &rusqlite::Connection,
        id: ValidatorId,
    ) -> SlashingProtectionResult<Option<SigningWatermark>> {
        let existing = watermarks::find(conn, id)?;

        if let Some(max_slot) = blocks::max_slot(conn, id)? {
            let slot = advance(
                existing.and_then(|w| w.slot),
                prune_candidate(max_slot, self.slots_to_keep),
            );
            watermarks::update_slot(conn, id, slot)?;
        }

        if let Some(max_target) = attestations::max_target(conn, id)? {
            let target = advance(
                existing.and_then(|w| w.target_epoch),
                prune_candidate(max_target, self.epochs_to_keep),
            );
            let oldest_retained_source =
                attestations::find_nearest_from_target(conn, id, target)?.map(|a| a.source_epoch);
            let pruned_source = attestations::max_source_below_target(conn, id, target)?;
            let source = [
                existing.and_then(|w| w.source_epoch),
                oldest_retained_source,
                pruned_source,
            ]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(0);
            watermarks::update_epochs(conn, id, source, target)?;
        }

        watermarks::find(conn, id)
    }
}
