//! Driving Port (API - Inbound)
//!
//! What the signing handler and the operator tooling call. Decisions are
//! blocking; async hosts dispatch them to a blocking worker pool.

use std::io::{Read, Write};

use shared_types::{Epoch, GenesisValidatorsRoot, PublicKey, SigningRoot, Slot};

use crate::error::SlashingProtectionResult;
use crate::interchange::ImportSummary;
use crate::pruner::PruneSummary;

/// Slashing protection API.
///
/// The two `may_sign_*` methods are the signing gate. They answer only yes
/// or no: a `true` has already been recorded, so the caller must sign
/// exactly the root it asked about. Every internal failure is a `false`.
pub trait SlashingProtection: Send + Sync {
    /// May `public_key` sign the block `signing_root` at `slot`?
    fn may_sign_block(
        &self,
        public_key: &PublicKey,
        signing_root: &SigningRoot,
        slot: Slot,
        genesis_validators_root: &GenesisValidatorsRoot,
    ) -> bool;

    /// May `public_key` sign the attestation `signing_root` for
    /// `(source_epoch, target_epoch)`?
    fn may_sign_attestation(
        &self,
        public_key: &PublicKey,
        signing_root: &SigningRoot,
        source_epoch: Epoch,
        target_epoch: Epoch,
        genesis_validators_root: &GenesisValidatorsRoot,
    ) -> bool;

    /// Register keys so they can sign. Idempotent.
    fn register_validators(&self, public_keys: &[PublicKey]) -> SlashingProtectionResult<()>;

    /// Whether the key is registered and backed by a validator row.
    fn has_protection_data_for(&self, public_key: &PublicKey) -> SlashingProtectionResult<bool>;

    /// Enable or disable signing for a registered key.
    fn update_validator_enabled_status(
        &self,
        public_key: &PublicKey,
        enabled: bool,
    ) -> SlashingProtectionResult<()>;

    /// Export the history of every validator.
    fn export_data(&self, out: &mut dyn Write) -> SlashingProtectionResult<()>;

    /// Export the history of the given validators only.
    fn export_data_with_filter(
        &self,
        out: &mut dyn Write,
        public_keys: &[PublicKey],
    ) -> SlashingProtectionResult<()>;

    /// Import an interchange document.
    fn import_data(&self, input: &mut dyn Read) -> SlashingProtectionResult<ImportSummary>;

    /// Run one pruning pass over all registered validators.
    fn prune(&self) -> PruneSummary;
}
