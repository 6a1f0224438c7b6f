//! Slashing Protection Service - signing decisions and administration
//!
//! Every decision runs as one serializable transaction: load the relevant
//! history, classify with [`crate::domain::rules`], persist on a first-time
//! allow, commit. Any error is folded into a deny.

use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::RwLock;
use rusqlite::Connection;
use shared_types::{Epoch, GenesisValidatorsRoot, PublicKey, SigningRoot, Slot};
use tracing::{debug, error, info, warn};

use crate::config::SlashingProtectionConfig;
use crate::domain::rules::{self, AttestationHistory};
use crate::domain::{DenyReason, HighWatermark, SignedAttestation, SignedBlock, ValidatorId, Verdict};
use crate::error::{SlashingProtectionError, SlashingProtectionResult};
use crate::interchange::{exporter, ImportSummary, IncrementalExporter, InterchangeImporter};
use crate::ports::inbound::SlashingProtection;
use crate::pruner::{DbPruner, PruneSummary};
use crate::registry::RegisteredValidators;
use crate::storage::dao::{attestations, blocks, metadata, validators, watermarks};
use crate::storage::lock::lock_all_for_validator;
use crate::storage::{Database, IsolationLevel};

/// Database-backed slashing protection.
pub struct DbSlashingProtection {
    db: Arc<Database>,
    registered: Arc<RegisteredValidators>,
    pruner: DbPruner,
    network_root: Option<GenesisValidatorsRoot>,
    /// Root read back from committed metadata.
    verified_root: RwLock<Option<GenesisValidatorsRoot>>,
}

impl DbSlashingProtection {
    /// Open the database (fatal on schema mismatch) and load the registered
    /// validators.
    pub fn open(config: &SlashingProtectionConfig) -> SlashingProtectionResult<Self> {
        let db = Arc::new(Database::open(&config.database, &config.retry)?);
        let registered = Arc::new(RegisteredValidators::load(Arc::clone(&db))?);
        Self::new(db, registered, config)
    }

    pub fn new(
        db: Arc<Database>,
        registered: Arc<RegisteredValidators>,
        config: &SlashingProtectionConfig,
    ) -> SlashingProtectionResult<Self> {
        let pruner = DbPruner::from_config(Arc::clone(&db), Arc::clone(&registered), &config.pruning)?;
        Ok(Self {
            db,
            registered,
            pruner,
            network_root: config.genesis_validators_root,
            verified_root: RwLock::new(None),
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn registered_validators(&self) -> &Arc<RegisteredValidators> {
        &self.registered
    }

    pub fn pruner(&self) -> &DbPruner {
        &self.pruner
    }

    // =========================================================================
    // DECISIONS
    // =========================================================================

    /// Full verdict for a block proposal.
    pub fn check_block(
        &self,
        public_key: &PublicKey,
        signing_root: &SigningRoot,
        slot: Slot,
        genesis_validators_root: &GenesisValidatorsRoot,
    ) -> SlashingProtectionResult<Verdict> {
        let Some(id) = self.registered.validator_id_for(public_key) else {
            return Ok(Verdict::Deny(DenyReason::UnregisteredValidator));
        };

        self.db.in_transaction(IsolationLevel::Serializable, |tx| {
            if let Some(reason) = self.precondition_failure(tx, id, genesis_validators_root)? {
                return Ok(Verdict::Deny(reason));
            }
            if watermarks::find(tx, id)?.is_some_and(|wm| wm.rejects_block(slot)) {
                return Ok(Verdict::Deny(DenyReason::BelowLowWatermark));
            }
            if metadata::find_high_watermark(tx)?.is_some_and(|high| high.rejects_block(slot)) {
                return Ok(Verdict::Deny(DenyReason::AtOrAboveHighWatermark));
            }

            let existing = blocks::find_at_slot(tx, id, slot)?;
            let verdict = rules::check_block(existing.as_ref(), signing_root);
            if verdict == (Verdict::Allow { persist: true }) {
                blocks::insert(
                    tx,
                    &SignedBlock {
                        validator_id: id,
                        slot,
                        signing_root: Some(*signing_root),
                    },
                )?;
            }
            Ok(verdict)
        })
    }

    /// Full verdict for an attestation.
    pub fn check_attestation(
        &self,
        public_key: &PublicKey,
        signing_root: &SigningRoot,
        source_epoch: Epoch,
        target_epoch: Epoch,
        genesis_validators_root: &GenesisValidatorsRoot,
    ) -> SlashingProtectionResult<Verdict> {
        let Some(id) = self.registered.validator_id_for(public_key) else {
            return Ok(Verdict::Deny(DenyReason::UnregisteredValidator));
        };
        if source_epoch > target_epoch {
            return Ok(Verdict::Deny(DenyReason::SourceAfterTarget));
        }

        self.db.in_transaction(IsolationLevel::Serializable, |tx| {
            if let Some(reason) = self.precondition_failure(tx, id, genesis_validators_root)? {
                return Ok(Verdict::Deny(reason));
            }
            if watermarks::find(tx, id)?
                .is_some_and(|wm| wm.rejects_attestation(source_epoch, target_epoch))
            {
                return Ok(Verdict::Deny(DenyReason::BelowLowWatermark));
            }
            if metadata::find_high_watermark(tx)?
                .is_some_and(|high| high.rejects_attestation(source_epoch, target_epoch))
            {
                return Ok(Verdict::Deny(DenyReason::AtOrAboveHighWatermark));
            }

            let history = AttestationHistory {
                at_target: attestations::find_at_target(tx, id, target_epoch)?,
                surrounding: attestations::find_surrounding(tx, id, source_epoch, target_epoch)?,
                surrounded: attestations::find_surrounded(tx, id, source_epoch, target_epoch)?,
            };
            let verdict = rules::check_attestation(&history, target_epoch, signing_root);
            if verdict == (Verdict::Allow { persist: true }) {
                attestations::upsert(
                    tx,
                    &SignedAttestation {
                        validator_id: id,
                        source_epoch,
                        target_epoch,
                        signing_root: Some(*signing_root),
                    },
                )?;
            }
            Ok(verdict)
        })
    }

    /// Disabled validator or foreign network.
    fn precondition_failure(
        &self,
        conn: &Connection,
        id: ValidatorId,
        genesis_validators_root: &GenesisValidatorsRoot,
    ) -> SlashingProtectionResult<Option<DenyReason>> {
        if !validators::is_enabled(conn, id)? {
            return Ok(Some(DenyReason::ValidatorDisabled));
        }
        if !self.genesis_root_matches(conn, genesis_validators_root)? {
            return Ok(Some(DenyReason::GenesisValidatorsRootMismatch));
        }
        Ok(None)
    }

    /// Compare against the stored root, storing `root` on first use.
    ///
    /// Only a root read back from the database is cached; a root inserted by
    /// this transaction is not, since the transaction may still roll back.
    fn genesis_root_matches(
        &self,
        conn: &Connection,
        root: &GenesisValidatorsRoot,
    ) -> SlashingProtectionResult<bool> {
        if let Some(verified) = *self.verified_root.read() {
            return Ok(verified == *root);
        }
        match metadata::find_genesis_validators_root(conn)? {
            Some(stored) => {
                *self.verified_root.write() = Some(stored);
                Ok(stored == *root)
            }
            None => {
                info!(genesis_validators_root = %root, "Storing genesis validators root");
                metadata::insert_genesis_validators_root(conn, root)?;
                Ok(true)
            }
        }
    }

    fn resolve(verdict: SlashingProtectionResult<Verdict>, describe: impl FnOnce() -> String) -> bool {
        match verdict {
            Ok(Verdict::Allow { persist }) => {
                debug!(persisted = persist, "{} allowed", describe());
                true
            }
            Ok(Verdict::Deny(reason)) => {
                warn!(%reason, "{} denied", describe());
                false
            }
            Err(err) => {
                error!(error = %err, reason = %DenyReason::StorageFailure, "{} denied", describe());
                false
            }
        }
    }

    // =========================================================================
    // HIGH WATERMARK
    // =========================================================================

    /// Set the signing ceiling. Rejected when below any low watermark.
    pub fn set_high_watermark(&self, high: HighWatermark) -> SlashingProtectionResult<()> {
        if high.is_empty() {
            return Err(SlashingProtectionError::InvalidArgument(
                "high watermark needs a slot or an epoch".into(),
            ));
        }
        self.db.in_transaction(IsolationLevel::Serializable, |tx| {
            let (max_slot, max_epoch) = watermarks::max_across_validators(tx)?;
            if let (Some(high_slot), Some(low)) = (high.slot, max_slot) {
                if high_slot < low {
                    return Err(SlashingProtectionError::InvalidArgument(format!(
                        "high watermark slot {high_slot} is below low watermark slot {low}"
                    )));
                }
            }
            if let (Some(high_epoch), Some(low)) = (high.epoch, max_epoch) {
                if high_epoch < low {
                    return Err(SlashingProtectionError::InvalidArgument(format!(
                        "high watermark epoch {high_epoch} is below low watermark epoch {low}"
                    )));
                }
            }
            metadata::update_high_watermark(tx, &high)
        })?;
        info!(slot = ?high.slot, epoch = ?high.epoch, "High watermark set");
        Ok(())
    }

    pub fn get_high_watermark(&self) -> SlashingProtectionResult<Option<HighWatermark>> {
        self.db
            .in_transaction(IsolationLevel::Snapshot, |tx| metadata::find_high_watermark(tx))
    }

    pub fn delete_high_watermark(&self) -> SlashingProtectionResult<()> {
        self.db
            .in_transaction(IsolationLevel::Serializable, |tx| metadata::delete_high_watermark(tx))?;
        info!("High watermark removed");
        Ok(())
    }

    // =========================================================================
    // INTERCHANGE
    // =========================================================================

    /// Start an incremental export into `out`.
    pub fn create_incremental_exporter<W: Write>(
        &self,
        out: W,
    ) -> SlashingProtectionResult<IncrementalExporter<W>> {
        IncrementalExporter::open(Arc::clone(&self.db), out)
    }

    fn importer(&self) -> InterchangeImporter {
        InterchangeImporter::new(
            Arc::clone(&self.db),
            Arc::clone(&self.registered),
            self.network_root,
        )
    }
}

impl SlashingProtection for DbSlashingProtection {
    fn may_sign_block(
        &self,
        public_key: &PublicKey,
        signing_root: &SigningRoot,
        slot: Slot,
        genesis_validators_root: &GenesisValidatorsRoot,
    ) -> bool {
        let verdict = self.check_block(public_key, signing_root, slot, genesis_validators_root);
        Self::resolve(verdict, || {
            format!("Block signing for {public_key} at slot {slot}")
        })
    }

    fn may_sign_attestation(
        &self,
        public_key: &PublicKey,
        signing_root: &SigningRoot,
        source_epoch: Epoch,
        target_epoch: Epoch,
        genesis_validators_root: &GenesisValidatorsRoot,
    ) -> bool {
        let verdict = self.check_attestation(
            public_key,
            signing_root,
            source_epoch,
            target_epoch,
            genesis_validators_root,
        );
        Self::resolve(verdict, || {
            format!(
                "Attestation signing for {public_key} with source {source_epoch} target {target_epoch}"
            )
        })
    }

    fn register_validators(&self, public_keys: &[PublicKey]) -> SlashingProtectionResult<()> {
        self.registered.register_validators(public_keys)
    }

    fn has_protection_data_for(&self, public_key: &PublicKey) -> SlashingProtectionResult<bool> {
        if self.registered.validator_id_for(public_key).is_none() {
            return Ok(false);
        }
        let validator = self.db.in_transaction(IsolationLevel::Snapshot, |tx| {
            validators::find_by_public_key(tx, public_key)
        })?;
        Ok(validator.is_some())
    }

    fn update_validator_enabled_status(
        &self,
        public_key: &PublicKey,
        enabled: bool,
    ) -> SlashingProtectionResult<()> {
        let id = self.registered.must_get_validator_id_for(public_key)?;
        self.db.in_transaction(IsolationLevel::Serializable, |tx| {
            lock_all_for_validator(tx, id)?;
            validators::set_enabled(tx, id, enabled)
        })?;
        info!(%public_key, enabled, "Updated validator enabled status");
        Ok(())
    }

    fn export_data(&self, out: &mut dyn Write) -> SlashingProtectionResult<()> {
        exporter::export_all(Arc::clone(&self.db), out, None)?;
        Ok(())
    }

    fn export_data_with_filter(
        &self,
        out: &mut dyn Write,
        public_keys: &[PublicKey],
    ) -> SlashingProtectionResult<()> {
        exporter::export_all(Arc::clone(&self.db), out, Some(public_keys))?;
        Ok(())
    }

    fn import_data(&self, input: &mut dyn Read) -> SlashingProtectionResult<ImportSummary> {
        self.importer().import(input)
    }

    fn prune(&self) -> PruneSummary {
        self.pruner.prune()
    }
}
