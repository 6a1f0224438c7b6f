//! # Watermarks
//!
//! The low watermark marks the oldest history still authoritative for a
//! validator; requests below it are refused because the history that would
//! prove them safe may have been pruned. The high watermark is an operator
//! ceiling above which nothing is signed.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Monotonic | [`advance`] never returns less than the existing value |
//! | Paired epochs | source and target are both set or both unset |

use shared_types::{Epoch, Slot};

use super::validator::ValidatorId;

/// Per-validator low watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningWatermark {
    pub validator_id: ValidatorId,
    pub slot: Option<Slot>,
    pub source_epoch: Option<Epoch>,
    pub target_epoch: Option<Epoch>,
}

impl SigningWatermark {
    /// Source and target, when both are set.
    pub fn epochs(&self) -> Option<(Epoch, Epoch)> {
        self.source_epoch.zip(self.target_epoch)
    }

    pub fn rejects_block(&self, slot: Slot) -> bool {
        self.slot.is_some_and(|wm| slot < wm)
    }

    pub fn rejects_attestation(&self, source: Epoch, target: Epoch) -> bool {
        self.target_epoch.is_some_and(|wm| target < wm)
            || self.source_epoch.is_some_and(|wm| source < wm)
    }
}

/// Operator-set upper bound on signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HighWatermark {
    pub slot: Option<Slot>,
    pub epoch: Option<Epoch>,
}

impl HighWatermark {
    pub fn is_empty(&self) -> bool {
        self.slot.is_none() && self.epoch.is_none()
    }

    pub fn rejects_block(&self, slot: Slot) -> bool {
        self.slot.is_some_and(|high| slot >= high)
    }

    pub fn rejects_attestation(&self, source: Epoch, target: Epoch) -> bool {
        self.epoch
            .is_some_and(|high| source >= high || target >= high)
    }
}

/// Lowest value to keep when `retain` units before and including `latest`
/// are retained: `max(0, latest - retain + 1)`.
pub fn prune_candidate(latest: u64, retain: u64) -> u64 {
    latest.saturating_add(1).saturating_sub(retain)
}

/// Monotonic move: the larger of the existing watermark and the candidate.
pub fn advance(existing: Option<u64>, candidate: u64) -> u64 {
    existing.map_or(candidate, |current| current.max(candidate))
}

/// Imported minimum wins only when it is above the existing value.
pub fn best_of(imported_min: Option<u64>, existing: Option<u64>) -> Option<u64> {
    match (imported_min, existing) {
        (Some(imported), Some(current)) => Some(imported.max(current)),
        (Some(imported), None) => Some(imported),
        (None, current) => current,
    }
}

/// Tracks the minimum of a stream of values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinTracker(Option<u64>);

impl MinTracker {
    pub fn track(&mut self, value: u64) {
        self.0 = Some(self.0.map_or(value, |current| current.min(value)));
    }

    pub fn get(&self) -> Option<u64> {
        self.0
    }
}
