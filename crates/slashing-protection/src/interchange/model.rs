//! Interchange document model.
//!
//! ```json
//! {"metadata": {"interchange_format_version": "5", "genesis_validators_root": "0x…"},
//!  "data": [{"pubkey": "0x…",
//!            "signed_blocks": [{"slot": "81952", "signing_root": "0x…"}],
//!            "signed_attestations": [{"source_epoch": "2290", "target_epoch": "3007"}]}]}
//! ```

use serde::{Deserialize, Serialize};
use shared_types::{Bytes32, Epoch, GenesisValidatorsRoot, PublicKey, SigningRoot, Slot};

/// The only format version read or written.
pub const FORMAT_VERSION: &str = "5";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchangeMetadata {
    pub interchange_format_version: String,
    pub genesis_validators_root: GenesisValidatorsRoot,
}

impl InterchangeMetadata {
    pub fn v5(genesis_validators_root: Bytes32) -> Self {
        Self {
            interchange_format_version: FORMAT_VERSION.to_string(),
            genesis_validators_root,
        }
    }
}

/// A complete interchange document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchangeV5 {
    pub metadata: InterchangeMetadata,
    #[serde(default)]
    pub data: Vec<SignedArtifacts>,
}

/// History of one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedArtifacts {
    pub pubkey: PublicKey,
    #[serde(default)]
    pub signed_blocks: Vec<InterchangeBlock>,
    #[serde(default)]
    pub signed_attestations: Vec<InterchangeAttestation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchangeBlock {
    #[serde(with = "quoted_u64")]
    pub slot: Slot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_root: Option<SigningRoot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchangeAttestation {
    #[serde(with = "quoted_u64")]
    pub source_epoch: Epoch,
    #[serde(with = "quoted_u64")]
    pub target_epoch: Epoch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_root: Option<SigningRoot>,
}

/// `u64` written as a decimal string; read from a string or a number.
mod quoted_u64 {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s
                .parse()
                .map_err(|e| D::Error::custom(format!("invalid integer {s:?}: {e}"))),
            StringOrNumber::Number(n) => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "metadata": {
            "interchange_format_version": "5",
            "genesis_validators_root": "0x04700007fabc8282644aed6d1c7c9e21d38a03a0c4ba193f3afe428824b3a673"
        },
        "data": [{
            "pubkey": "0xb845089a1457f811bfc000588fbb4e713669be8ce060ea6be3c6ece09afc3794106c91ca73acda5e5457122d58723bed",
            "signed_blocks": [
                {"slot": "81952", "signing_root": "0x4ff6f743a43f3b4f95350831aeaf0a122a1a392922c45d804280284a69eb850b"},
                {"slot": "81951"}
            ],
            "signed_attestations": [
                {"source_epoch": "2290", "target_epoch": "3007",
                 "signing_root": "0x587d6a4f59a58fe24f406e0502413e77fe1babddee641fda30034ed37ecc884d"},
                {"source_epoch": 2290, "target_epoch": 3008}
            ]
        }]
    }"#;

    #[test]
    fn test_parses_reference_document() {
        let doc: InterchangeV5 = serde_json::from_str(DOCUMENT).unwrap();
        assert_eq!(doc.metadata.interchange_format_version, FORMAT_VERSION);
        let validator = &doc.data[0];
        assert_eq!(validator.signed_blocks.len(), 2);
        assert_eq!(validator.signed_blocks[0].slot, 81952);
        assert!(validator.signed_blocks[1].signing_root.is_none());
        assert_eq!(validator.signed_attestations[1].target_epoch, 3008);
    }

    #[test]
    fn test_numbers_serialise_as_strings() {
        let block = InterchangeBlock {
            slot: 12,
            signing_root: None,
        };
        assert_eq!(serde_json::to_string(&block).unwrap(), r#"{"slot":"12"}"#);
    }

    #[test]
    fn test_missing_history_lists_default_to_empty() {
        let doc: InterchangeV5 = serde_json::from_str(
            r#"{"metadata": {"interchange_format_version": "5",
                "genesis_validators_root": "0x0000000000000000000000000000000000000000000000000000000000000000"},
               "data": [{"pubkey": "0x01"}]}"#,
        )
        .unwrap();
        assert!(doc.data[0].signed_blocks.is_empty());
        assert!(doc.data[0].signed_attestations.is_empty());
    }

    #[test]
    fn test_rejects_non_numeric_slot() {
        let result: Result<InterchangeBlock, _> = serde_json::from_str(r#"{"slot": "abc"}"#);
        assert!(result.is_err());
    }
}
