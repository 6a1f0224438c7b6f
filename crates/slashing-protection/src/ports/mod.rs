//! Ports: the API this crate offers to the signing service.

pub mod inbound;

pub use inbound::SlashingProtection;
