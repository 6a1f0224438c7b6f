//! # Error Types
//!
//! Errors raised while constructing shared value types.

use thiserror::Error;

/// Errors that can occur when parsing or building a shared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Input was not valid hexadecimal.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Input decoded to the wrong number of bytes.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A public key must carry at least one byte.
    #[error("Public key must not be empty")]
    EmptyPublicKey,
}
