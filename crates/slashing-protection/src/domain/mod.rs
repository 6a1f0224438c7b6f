//! Domain layer: pure types and rules, no I/O.

pub mod records;
pub mod rules;
pub mod validator;
pub mod watermark;

pub use records::{SignedAttestation, SignedBlock};
pub use rules::{DenyReason, Verdict};
pub use validator::{Validator, ValidatorId};
pub use watermark::{HighWatermark, MinTracker, SigningWatermark};
