//! Sub-command execution.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use shared_types::PublicKey;
use signer_runtime::SignerConfig;
use slashing_protection::{DbSlashingProtection, HighWatermark, SlashingProtection};
use tracing::info;

use crate::{Command, HighWatermarkAction};

fn open(config: &SignerConfig) -> Result<DbSlashingProtection> {
    DbSlashingProtection::open(&config.protection_config()).with_context(|| {
        format!(
            "Failed to open slashing protection database {}",
            config.database.path.display()
        )
    })
}

pub fn run(command: Command, mut config: SignerConfig, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Export { output, pubkeys } => {
            let protection = open(&config)?;
            match output {
                Some(path) => export_to_file(&protection, &path, &pubkeys)?,
                None => export(&protection, out, &pubkeys)?,
            }
        }

        Command::Import { input } => {
            let protection = open(&config)?;
            let file = File::open(&input)
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let summary = protection
                .import_data(&mut BufReader::new(file))
                .with_context(|| format!("Failed to import {}", input.display()))?;
            writeln!(
                out,
                "Imported {} validators: {} blocks ({} skipped), {} attestations ({} skipped)",
                summary.validators,
                summary.blocks_imported,
                summary.blocks_skipped,
                summary.attestations_imported,
                summary.attestations_skipped
            )?;
        }

        Command::Prune {
            epochs_to_keep,
            slots_per_epoch,
        } => {
            if let Some(epochs) = epochs_to_keep {
                config.pruning.epochs_to_keep = epochs;
            }
            if let Some(slots) = slots_per_epoch {
                config.pruning.slots_per_epoch = slots;
            }
            let summary = open(&config)?.prune();
            writeln!(
                out,
                "Pruned {} validators: {} blocks, {} attestations deleted",
                summary.validators, summary.blocks_deleted, summary.attestations_deleted
            )?;
            if summary.failed > 0 {
                bail!("pruning failed for {} validators", summary.failed);
            }
        }

        Command::Register { pubkeys } => {
            open(&config)?.register_validators(&pubkeys)?;
            writeln!(out, "Registered {} validators", pubkeys.len())?;
        }

        Command::Enable { pubkey } => set_enabled(&config, &pubkey, true, out)?,
        Command::Disable { pubkey } => set_enabled(&config, &pubkey, false, out)?,

        Command::HighWatermark { action } => {
            let protection = open(&config)?;
            match action {
                HighWatermarkAction::Get => match protection.get_high_watermark()? {
                    Some(high) => writeln!(
                        out,
                        "slot: {}, epoch: {}",
                        bound(high.slot),
                        bound(high.epoch)
                    )?,
                    None => writeln!(out, "No high watermark set")?,
                },
                HighWatermarkAction::Set { slot, epoch } => {
                    protection.set_high_watermark(HighWatermark { slot, epoch })?;
                    writeln!(out, "High watermark set")?;
                }
                HighWatermarkAction::Delete => {
                    protection.delete_high_watermark()?;
                    writeln!(out, "High watermark removed")?;
                }
            }
        }
    }
    Ok(())
}

fn export(protection: &DbSlashingProtection, out: &mut dyn Write, pubkeys: &[PublicKey]) -> Result<()> {
    if pubkeys.is_empty() {
        protection.export_data(out)?;
    } else {
        protection.export_data_with_filter(out, pubkeys)?;
    }
    Ok(())
}

fn export_to_file(protection: &DbSlashingProtection, path: &Path, pubkeys: &[PublicKey]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    export(protection, &mut writer, pubkeys)?;
    writer.flush()?;
    info!(path = %path.display(), "Export written");
    Ok(())
}

fn set_enabled(
    config: &SignerConfig,
    pubkey: &PublicKey,
    enabled: bool,
    out: &mut dyn Write,
) -> Result<()> {
    open(config)?.update_validator_enabled_status(pubkey, enabled)?;
    let state = if enabled { "enabled" } else { "disabled" };
    writeln!(out, "Validator {pubkey} {state}")?;
    Ok(())
}

fn bound(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Bytes32;

    const GVR: Bytes32 = Bytes32([4; 32]);

    fn key(n: u8) -> PublicKey {
        PublicKey::from_bytes(vec![n; 48]).unwrap()
    }

    fn config(dir: &tempfile::TempDir) -> SignerConfig {
        let mut config = SignerConfig::default();
        config.database.path = dir.path().join("sp.db");
        config
    }

    fn run_to_string(command: Command, config: &SignerConfig) -> Result<String> {
        let mut out = Vec::new();
        run(command, config.clone(), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn write_document(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("interchange.json");
        let document = serde_json::json!({
            "metadata": {
                "interchange_format_version": "5",
                "genesis_validators_root": GVR.to_string(),
            },
            "data": [{
                "pubkey": key(1).to_string(),
                "signed_blocks": [{"slot": "1"}, {"slot": "2"}],
                "signed_attestations": [{"source_epoch": "1", "target_epoch": "2"}],
            }]
        });
        std::fs::write(&path, document.to_string()).unwrap();
        path
    }

    #[test]
    fn test_import_then_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let input = write_document(&dir);

        let report = run_to_string(Command::Import { input }, &config).unwrap();
        assert!(report.starts_with("Imported 1 validators: 2 blocks"));

        let output = dir.path().join("export.json");
        run_to_string(
            Command::Export {
                output: Some(output.clone()),
                pubkeys: vec![],
            },
            &config,
        )
        .unwrap();
        let exported: serde_json::Value =
            serde_json::from_slice(&std::fs::read(output).unwrap()).unwrap();
        assert_eq!(exported["data"][0]["pubkey"], key(1).to_string().as_str());
        assert_eq!(exported["data"][0]["signed_blocks"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_export_to_stdout_with_filter() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        run_to_string(
            Command::Import {
                input: write_document(&dir),
            },
            &config,
        )
        .unwrap();

        let text = run_to_string(
            Command::Export {
                output: None,
                pubkeys: vec![key(2)],
            },
            &config,
        )
        .unwrap();

        let exported: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(exported["data"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_prune_with_retention_override() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        run_to_string(
            Command::Import {
                input: write_document(&dir),
            },
            &config,
        )
        .unwrap();

        let report = run_to_string(
            Command::Prune {
                epochs_to_keep: Some(1),
                slots_per_epoch: Some(1),
            },
            &config,
        )
        .unwrap();

        assert_eq!(
            report.trim(),
            "Pruned 1 validators: 1 blocks, 0 attestations deleted"
        );
    }

    #[test]
    fn test_register_and_disable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);

        run_to_string(
            Command::Register {
                pubkeys: vec![key(1), key(2)],
            },
            &config,
        )
        .unwrap();
        run_to_string(Command::Disable { pubkey: key(2) }, &config).unwrap();

        let protection = open(&config).unwrap();
        assert!(protection.may_sign_block(&key(1), &Bytes32([1; 32]), 1, &GVR));
        assert!(!protection.may_sign_block(&key(2), &Bytes32([1; 32]), 1, &GVR));
    }

    #[test]
    fn test_disable_unknown_validator_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);

        assert!(run_to_string(Command::Disable { pubkey: key(9) }, &config).is_err());
    }

    #[test]
    fn test_high_watermark_commands() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        run_to_string(
            Command::Import {
                input: write_document(&dir),
            },
            &config,
        )
        .unwrap();

        let get = || {
            run_to_string(
                Command::HighWatermark {
                    action: HighWatermarkAction::Get,
                },
                &config,
            )
            .unwrap()
        };
        assert_eq!(get().trim(), "No high watermark set");

        run_to_string(
            Command::HighWatermark {
                action: HighWatermarkAction::Set {
                    slot: Some(100),
                    epoch: None,
                },
            },
            &config,
        )
        .unwrap();
        assert_eq!(get().trim(), "slot: 100, epoch: -");

        run_to_string(
            Command::HighWatermark {
                action: HighWatermarkAction::Delete,
            },
            &config,
        )
        .unwrap();
        assert_eq!(get().trim(), "No high watermark set");
    }
}
