//! Incremental interchange JSON writer.
//!
//! Emits the document piecewise: metadata on start, then each validator's
//! blocks and attestations record by record, then the closing brackets on
//! finish. Records are serialised one at a time with `serde_json`; nothing is
//! buffered beyond the current record.

use std::io::Write;

use shared_types::{GenesisValidatorsRoot, PublicKey};

use super::model::{InterchangeAttestation, InterchangeBlock, InterchangeMetadata};
use crate::error::{SlashingProtectionError, SlashingProtectionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Inside `data`, between validators.
    Data,
    Blocks,
    Attestations,
}

pub struct InterchangeWriter<W: Write> {
    out: W,
    position: Position,
    validators: usize,
    items: usize,
}

impl<W: Write> InterchangeWriter<W> {
    /// Write the metadata header and open the `data` array.
    pub fn start(mut out: W, root: &GenesisValidatorsRoot) -> SlashingProtectionResult<Self> {
        out.write_all(b"{\"metadata\":")?;
        serde_json::to_writer(&mut out, &InterchangeMetadata::v5(*root))?;
        out.write_all(b",\"data\":[")?;
        Ok(Self {
            out,
            position: Position::Data,
            validators: 0,
            items: 0,
        })
    }

    /// Open a validator entry and its `signed_blocks` array.
    pub fn begin_validator(&mut self, public_key: &PublicKey) -> SlashingProtectionResult<()> {
        self.expect(Position::Data)?;
        if self.validators > 0 {
            self.out.write_all(b",")?;
        }
        self.out.write_all(b"{\"pubkey\":")?;
        serde_json::to_writer(&mut self.out, public_key)?;
        self.out.write_all(b",\"signed_blocks\":[")?;
        self.validators += 1;
        self.items = 0;
        self.position = Position::Blocks;
        Ok(())
    }

    pub fn write_block(&mut self, block: &InterchangeBlock) -> SlashingProtectionResult<()> {
        self.expect(Position::Blocks)?;
        self.separator()?;
        serde_json::to_writer(&mut self.out, block)?;
        Ok(())
    }

    /// Close `signed_blocks` and open `signed_attestations`.
    pub fn begin_attestations(&mut self) -> SlashingProtectionResult<()> {
        self.expect(Position::Blocks)?;
        self.out.write_all(b"],\"signed_attestations\":[")?;
        self.items = 0;
        self.position = Position::Attestations;
        Ok(())
    }

    pub fn write_attestation(
        &mut self,
        attestation: &InterchangeAttestation,
    ) -> SlashingProtectionResult<()> {
        self.expect(Position::Attestations)?;
        self.separator()?;
        serde_json::to_writer(&mut self.out, attestation)?;
        Ok(())
    }

    /// Close the validator entry, opening an empty attestation list if none
    /// was started.
    pub fn end_validator(&mut self) -> SlashingProtectionResult<()> {
        if self.position == Position::Blocks {
            self.begin_attestations()?;
        }
        self.expect(Position::Attestations)?;
        self.out.write_all(b"]}")?;
        self.position = Position::Data;
        Ok(())
    }

    /// Close the document, flush, and hand back the sink.
    pub fn finish(mut self) -> SlashingProtectionResult<W> {
        self.expect(Position::Data)?;
        self.out.write_all(b"]}")?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn separator(&mut self) -> SlashingProtectionResult<()> {
        if self.items > 0 {
            self.out.write_all(b",")?;
        }
        self.items += 1;
        Ok(())
    }

    fn expect(&self, position: Position) -> SlashingProtectionResult<()> {
        if self.position != position {
            return Err(SlashingProtectionError::InvalidArgument(format!(
                "interchange writer is in {:?}, expected {:?}",
                self.position, position
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interchange::InterchangeV5;
    use shared_types::Bytes32;

    fn key(byte: u8) -> PublicKey {
        PublicKey::from_bytes(vec![byte; 4]).unwrap()
    }

    #[test]
    fn test_empty_document_is_valid() {
        let writer = InterchangeWriter::start(Vec::new(), &Bytes32::ZERO).unwrap();
        let bytes = writer.finish().unwrap();
        let doc: InterchangeV5 = serde_json::from_slice(&bytes).unwrap();
        assert!(doc.data.is_empty());
        assert_eq!(doc.metadata.genesis_validators_root, Bytes32::ZERO);
    }

    #[test]
    fn test_streamed_document_parses_back() {
        let mut writer = InterchangeWriter::start(Vec::new(), &Bytes32([1; 32])).unwrap();

        writer.begin_validator(&key(1)).unwrap();
        writer
            .write_block(&InterchangeBlock {
                slot: 5,
                signing_root: Some(Bytes32([2; 32])),
            })
            .unwrap();
        writer
            .write_block(&InterchangeBlock {
                slot: 6,
                signing_root: None,
            })
            .unwrap();
        writer.begin_attestations().unwrap();
        writer
            .write_attestation(&InterchangeAttestation {
                source_epoch: 1,
                target_epoch: 2,
                signing_root: None,
            })
            .unwrap();
        writer.end_validator().unwrap();

        writer.begin_validator(&key(2)).unwrap();
        writer.end_validator().unwrap();

        let doc: InterchangeV5 = serde_json::from_slice(&writer.finish().unwrap()).unwrap();
        assert_eq!(doc.data.len(), 2);
        assert_eq!(doc.data[0].signed_blocks.len(), 2);
        assert_eq!(doc.data[0].signed_attestations.len(), 1);
        assert_eq!(doc.data[1].pubkey, key(2));
        assert!(doc.data[1].signed_blocks.is_empty());
    }

    #[test]
    fn test_out_of_order_calls_are_rejected() {
        let mut writer = InterchangeWriter::start(Vec::new(), &Bytes32::ZERO).unwrap();
        let block = InterchangeBlock {
            slot: 1,
            signing_root: None,
        };
        assert!(writer.write_block(&block).is_err());
        writer.begin_validator(&key(1)).unwrap();
        assert!(writer.begin_validator(&key(2)).is_err());
    }
}
