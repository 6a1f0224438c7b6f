//! Signed history records.

use shared_types::{Epoch, SigningRoot, Slot};

use super::validator::ValidatorId;

/// A block proposal that was signed (or imported).
///
/// `signing_root == None` is a null record: the slot is known to be used but
/// the root was not recorded, so no second signature at that slot is safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBlock {
    pub validator_id: ValidatorId,
    pub slot: Slot,
    pub signing_root: Option<SigningRoot>,
}

/// An attestation that was signed (or imported).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAttestation {
    pub validator_id: ValidatorId,
    pub source_epoch: Epoch,
    pub target_epoch: Epoch,
    pub signing_root: Option<SigningRoot>,
}

impl SignedAttestation {
    /// `self` strictly contains the `(source, target)` interval.
    pub fn surrounds(&self, source: Epoch, target: Epoch) -> bool {
        self.source_epoch < source && self.target_epoch > target
    }

    /// `self` is strictly contained in the `(source, target)` interval.
    pub fn is_surrounded_by(&self, source: Epoch, target: Epoch) -> bool {
        source < self.source_epoch && target > self.target_epoch
    }

    /// Same target and same recorded root.
    pub fn matches(&self, target: Epoch, signing_root: Option<&SigningRoot>) -> bool {
        self.target_epoch == target && self.signing_root.as_ref() == signing_root
    }
}
