//! # Interchange
//!
//! EIP-3076 style import and export of slashing-protection history
//! (interchange format version 5).
//!
//! Export streams one validator at a time through [`InterchangeWriter`], so
//! memory stays constant in the size of the history. Import parses and
//! validates the whole document before touching the database, then applies
//! every entry inside a single transaction.

pub mod exporter;
pub mod importer;
pub mod model;
pub mod writer;

pub use exporter::IncrementalExporter;
pub use importer::{ImportSummary, InterchangeImporter};
pub use model::{
    InterchangeAttestation, InterchangeBlock, InterchangeMetadata, InterchangeV5, SignedArtifacts,
    FORMAT_VERSION,
};
pub use writer::InterchangeWriter;
