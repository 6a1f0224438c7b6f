//! Table access. Every function takes the connection (or transaction) to run
//! on; transaction scope is owned by the caller.

pub mod attestations;
pub mod blocks;
pub mod metadata;
pub mod validators;
pub mod watermarks;
