//! # Shared Types Crate
//!
//! Primitive value types used across the signer workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: keys, roots and ordering keys are defined once
//!   here and reused by storage, runtime and tooling.
//! - **Hex on the wire**: every byte type serialises as a `0x`-prefixed
//!   lowercase hex string, the representation used by the interchange format.
//! - **Validated construction**: a `Bytes32` is always exactly 32 bytes and a
//!   `PublicKey` is never empty.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
