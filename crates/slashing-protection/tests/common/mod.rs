//! Shared fixtures for the slashing-protection integration tests.

#![allow(dead_code)]

use std::io::Cursor;

use shared_types::{Bytes32, GenesisValidatorsRoot, PublicKey, SigningRoot};
use slashing_protection::domain::{SignedAttestation, SignedBlock};
use slashing_protection::storage::dao::{attestations, blocks, watermarks};
use slashing_protection::{
    DatabaseConfig, DbSlashingProtection, ImportSummary, PruningConfig, RetryConfig,
    SigningWatermark, SlashingProtection, SlashingProtectionConfig, SlashingProtectionResult,
    ValidatorId,
};
use tempfile::TempDir;

pub const GVR: GenesisValidatorsRoot = Bytes32([0x04; 32]);
pub const OTHER_GVR: GenesisValidatorsRoot = Bytes32([0x05; 32]);

/// A protection instance over a fresh database in a temporary directory.
pub struct TestContext {
    pub dir: TempDir,
    pub config: SlashingProtectionConfig,
    pub protection: DbSlashingProtection,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_pruning(PruningConfig::default())
    }

    pub fn with_pruning(pruning: PruningConfig) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = SlashingProtectionConfig {
            database: DatabaseConfig::at(dir.path().join("slashing-protection.db")).with_pool_size(4),
            retry: RetryConfig::default(),
            pruning,
            genesis_validators_root: None,
        };
        let protection = DbSlashingProtection::open(&config).expect("open protection");
        Self {
            dir,
            config,
            protection,
        }
    }

    /// Reopen the same database with a new instance.
    pub fn reopen(&self) -> DbSlashingProtection {
        DbSlashingProtection::open(&self.config).expect("reopen protection")
    }

    pub fn register(&self, key: &PublicKey) -> ValidatorId {
        self.protection
            .register_validators(std::slice::from_ref(key))
            .expect("register");
        self.id(key)
    }

    pub fn id(&self, key: &PublicKey) -> ValidatorId {
        self.protection
            .registered_validators()
            .validator_id_for(key)
            .expect("registered")
    }

    pub fn sign_block(&self, key: &PublicKey, root: SigningRoot, slot: u64) -> bool {
        self.protection.may_sign_block(key, &root, slot, &GVR)
    }

    pub fn sign_attestation(&self, key: &PublicKey, root: SigningRoot, source: u64, target: u64) -> bool {
        self.protection
            .may_sign_attestation(key, &root, source, target, &GVR)
    }

    pub fn blocks(&self, id: ValidatorId) -> Vec<SignedBlock> {
        let conn = self.protection.database().connection().unwrap();
        let mut rows = Vec::new();
        blocks::for_each_from(&conn, id, 0, |b| {
            rows.push(b);
            Ok(())
        })
        .unwrap();
        rows
    }

    pub fn attestations(&self, id: ValidatorId) -> Vec<SignedAttestation> {
        let conn = self.protection.database().connection().unwrap();
        let mut rows = Vec::new();
        attestations::for_each_from(&conn, id, 0, 0, |a| {
            rows.push(a);
            Ok(())
        })
        .unwrap();
        rows
    }

    pub fn watermark(&self, id: ValidatorId) -> Option<SigningWatermark> {
        let conn = self.protection.database().connection().unwrap();
        watermarks::find(&conn, id).unwrap()
    }

    pub fn export(&self) -> serde_json::Value {
        let mut out = Vec::new();
        self.protection.export_data(&mut out).expect("export");
        serde_json::from_slice(&out).expect("export is valid json")
    }

    pub fn import(&self, document: &str) -> SlashingProtectionResult<ImportSummary> {
        self.protection
            .import_data(&mut Cursor::new(document.as_bytes().to_vec()))
    }
}

pub fn key(n: u8) -> PublicKey {
    PublicKey::from_bytes(vec![n; 48]).unwrap()
}

pub fn root(n: u8) -> SigningRoot {
    Bytes32([n; 32])
}

/// Interchange document for one validator on the test network.
pub fn interchange(
    key: &PublicKey,
    blocks: &[(u64, Option<SigningRoot>)],
    attestations: &[(u64, u64, Option<SigningRoot>)],
) -> String {
    interchange_for(&GVR, "5", key, blocks, attestations)
}

pub fn interchange_for(
    gvr: &GenesisValidatorsRoot,
    version: &str,
    key: &PublicKey,
    blocks: &[(u64, Option<SigningRoot>)],
    attestations: &[(u64, u64, Option<SigningRoot>)],
) -> String {
    let blocks: Vec<serde_json::Value> = blocks
        .iter()
        .map(|(slot, root)| match root {
            Some(r) => serde_json::json!({"slot": slot.to_string(), "signing_root": r.to_string()}),
            None => serde_json::json!({"slot": slot.to_string()}),
        })
        .collect();
    let attestations: Vec<serde_json::Value> = attestations
        .iter()
        .map(|(source, target, root)| {
            let mut value = serde_json::json!({
                "source_epoch": source.to_string(),
                "target_epoch": target.to_string(),
            });
            if let Some(r) = root {
                value["signing_root"] = serde_json::Value::String(r.to_string());
            }
            value
        })
        .collect();
    serde_json::json!({
        "metadata": {
            "interchange_format_version": version,
            "genesis_validators_root": gvr.to_string(),
        },
        "data": [{
            "pubkey": key.to_string(),
            "signed_blocks": blocks,
            "signed_attestations": attestations,
        }]
    })
    .to_string()
}
