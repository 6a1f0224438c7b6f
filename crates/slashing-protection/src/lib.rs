//! # Slashing Protection
//!
//! Keeps a validator key from ever producing two conflicting signatures,
//! across restarts, concurrent requests, pruning and imports of history
//! from other signers.
//!
//! ## Overview
//!
//! Every signing request passes through the decision engine before a key is
//! touched. The engine consults the persisted history of the validator and
//! answers allow or deny; an allow is recorded in the same transaction.
//!
//! ## Architecture
//!
//! ```text
//!  signing handler ──may_sign_*──→ DbSlashingProtection ──→ rules (pure)
//!                                        │
//!          ┌─────────────────────────────┼──────────────────────────┐
//!          ↓                             ↓                          ↓
//!  RegisteredValidators              DbPruner              Interchange import/export
//!          │                             │                          │
//!          └──────────────→ Database (SQLite, pool, retry, locks) ←─┘
//! ```
//!
//! ## Safety Rules
//!
//! | Request | Denied when |
//! |---------|-------------|
//! | any | key unregistered or disabled, genesis validators root differs |
//! | block | slot below low watermark, at or above high watermark, different or unrecorded root at the slot |
//! | attestation | source > target, below low watermark, at or above high watermark, double vote, surround vote |
//!
//! Storage errors and exhausted retries also deny.
//!
//! ## Example
//!
//! ```rust,ignore
//! use slashing_protection::{DbSlashingProtection, SlashingProtection, SlashingProtectionConfig};
//!
//! let protection = DbSlashingProtection::open(&SlashingProtectionConfig::default())?;
//! protection.register_validators(&[public_key.clone()])?;
//! if protection.may_sign_block(&public_key, &signing_root, slot, &genesis_validators_root) {
//!     // sign
//! }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod interchange;
pub mod ports;
pub mod protection;
pub mod pruner;
pub mod registry;
pub mod storage;

pub use config::{DatabaseConfig, PruningConfig, RetryConfig, SlashingProtectionConfig};
pub use domain::{DenyReason, HighWatermark, SigningWatermark, ValidatorId, Verdict};
pub use error::{SlashingProtectionError, SlashingProtectionResult};
pub use interchange::{ImportSummary, IncrementalExporter};
pub use ports::SlashingProtection;
pub use protection::DbSlashingProtection;
pub use pruner::{DbPruner, PruneSummary};
pub use registry::RegisteredValidators;
pub use storage::{Database, IsolationLevel};
