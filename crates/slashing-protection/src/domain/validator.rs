//! Registered validator identity.

use std::fmt;

use shared_types::PublicKey;

/// Surrogate key of a validator row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidatorId(pub i64);

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validator row. Rows are never deleted; `enabled` is toggled instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub id: ValidatorId,
    pub public_key: PublicKey,
    pub enabled: bool,
}
