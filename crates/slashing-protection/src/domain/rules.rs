//! Signing verdicts.
//!
//! Pure classification of a request against the history the engine loaded
//! inside its transaction. Storage access stays in the service layer.

use std::fmt;

use shared_types::{Epoch, SigningRoot};

use super::records::{SignedAttestation, SignedBlock};

/// Why a signing request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    UnregisteredValidator,
    ValidatorDisabled,
    GenesisValidatorsRootMismatch,
    SourceAfterTarget,
    BelowLowWatermark,
    AtOrAboveHighWatermark,
    /// A different (or unrecorded) block exists at the slot.
    DoubleProposal,
    /// A different (or unrecorded) attestation exists at the target epoch.
    DoubleVote,
    /// An existing attestation surrounds the request.
    SurroundedByExisting,
    /// The request surrounds an existing attestation.
    SurroundsExisting,
    /// Storage failed or retries were exhausted.
    StorageFailure,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnregisteredValidator => "validator is not registered",
            Self::ValidatorDisabled => "validator is disabled",
            Self::GenesisValidatorsRootMismatch => "genesis validators root mismatch",
            Self::SourceAfterTarget => "source epoch is greater than target epoch",
            Self::BelowLowWatermark => "below low watermark",
            Self::AtOrAboveHighWatermark => "at or above high watermark",
            Self::DoubleProposal => "conflicts with a block at the same slot",
            Self::DoubleVote => "conflicts with an attestation at the same target epoch",
            Self::SurroundedByExisting => "surrounded by an existing attestation",
            Self::SurroundsExisting => "surrounds an existing attestation",
            Self::StorageFailure => "storage failure",
        };
        f.write_str(text)
    }
}

/// Outcome of a signing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Safe to sign. `persist` is false for an exact repeat.
    Allow { persist: bool },
    Deny(DenyReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// Classify a block proposal against the record at the same slot.
pub fn check_block(existing: Option<&SignedBlock>, signing_root: &SigningRoot) -> Verdict {
    match existing {
        None => Verdict::Allow { persist: true },
        Some(record) if record.signing_root.as_ref() == Some(signing_root) => {
            Verdict::Allow { persist: false }
        }
        Some(_) => Verdict::Deny(DenyReason::DoubleProposal),
    }
}

/// Loaded history relevant to one attestation request.
#[derive(Debug, Default)]
pub struct AttestationHistory {
    pub at_target: Option<SignedAttestation>,
    pub surrounding: Option<SignedAttestation>,
    pub surrounded: Option<SignedAttestation>,
}

/// Classify an attestation against the loaded history.
///
/// Conflicts are evaluated before the exact-match shortcut, so a history that
/// already holds a surrounding pair never yields an allow.
pub fn check_attestation(
    history: &AttestationHistory,
    target: Epoch,
    signing_root: &SigningRoot,
) -> Verdict {
    let exact = history
        .at_target
        .as_ref()
        .is_some_and(|existing| existing.matches(target, Some(signing_root)));

    if history.at_target.is_some() && !exact {
        return Verdict::Deny(DenyReason::DoubleVote);
    }
    if history.surrounding.is_some() {
        return Verdict::Deny(DenyReason::SurroundedByExisting);
    }
    if history.surrounded.is_some() {
        return Verdict::Deny(DenyReason::SurroundsExisting);
    }
    Verdict::Allow { persist: !exact }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidatorId;

    fn root(byte: u8) -> SigningRoot {
        SigningRoot::from([byte; 32])
    }

    fn block(signing_root: Option<SigningRoot>) -> SignedBlock {
        SignedBlock {
            validator_id: ValidatorId(1),
            slot: 3,
            signing_root,
        }
    }

    fn attestation(source: Epoch, target: Epoch, signing_root: Option<SigningRoot>) -> SignedAttestation {
        SignedAttestation {
            validator_id: ValidatorId(1),
            source_epoch: source,
            target_epoch: target,
            signing_root,
        }
    }

    #[test]
    fn test_block_first_signature_persists() {
        assert_eq!(check_block(None, &root(1)), Verdict::Allow { persist: true });
    }

    #[test]
    fn test_block_repeat_is_idempotent() {
        let existing = block(Some(root(1)));
        assert_eq!(
            check_block(Some(&existing), &root(1)),
            Verdict::Allow { persist: false }
        );
    }

    #[test]
    fn test_block_double_proposal() {
        let existing = block(Some(root(1)));
        assert_eq!(
            check_block(Some(&existing), &root(2)),
            Verdict::Deny(DenyReason::DoubleProposal)
        );
    }

    #[test]
    fn test_block_null_record_denies() {
        let existing = block(None);
        assert_eq!(
            check_block(Some(&existing), &root(1)),
            Verdict::Deny(DenyReason::DoubleProposal)
        );
    }

    #[test]
    fn test_attestation_double_vote() {
        let history = AttestationHistory {
            at_target: Some(attestation(5, 6, Some(root(1)))),
            ..Default::default()
        };
        assert_eq!(
            check_attestation(&history, 6, &root(2)),
            Verdict::Deny(DenyReason::DoubleVote)
        );
    }

    #[test]
    fn test_attestation_null_record_at_target_denies() {
        let history = AttestationHistory {
            at_target: Some(attestation(5, 6, None)),
            ..Default::default()
        };
        assert!(!check_attestation(&history, 6, &root(1)).is_allowed());
    }

    #[test]
    fn test_attestation_exact_match_is_idempotent() {
        let history = AttestationHistory {
            at_target: Some(attestation(5, 6, Some(root(1)))),
            ..Default::default()
        };
        assert_eq!(
            check_attestation(&history, 6, &root(1)),
            Verdict::Allow { persist: false }
        );
    }

    #[test]
    fn test_attestation_exact_match_still_checks_surround() {
        let history = AttestationHistory {
            at_target: Some(attestation(5, 6, Some(root(1)))),
            surrounding: Some(attestation(4, 7, Some(root(9)))),
            ..Default::default()
        };
        assert_eq!(
            check_attestation(&history, 6, &root(1)),
            Verdict::Deny(DenyReason::SurroundedByExisting)
        );
    }

    #[test]
    fn test_attestation_surrounds_existing() {
        let history = AttestationHistory {
            surrounded: Some(attestation(5, 6, Some(root(1)))),
            ..Default::default()
        };
        assert_eq!(
            check_attestation(&history, 7, &root(2)),
            Verdict::Deny(DenyReason::SurroundsExisting)
        );
    }
}
