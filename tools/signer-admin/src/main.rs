//! signer-admin: operator CLI for the slashing protection database.
//!
//! Works directly on the database file; stop the signer before importing or
//! pruning a database it has open, or run against a copy.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared_types::PublicKey;
use signer_runtime::{logging, SignerConfig};

/// signer-admin: slashing protection maintenance
#[derive(Parser, Debug)]
#[command(name = "signer-admin")]
#[command(about = "Import, export and prune the signer's slashing protection database")]
struct Args {
    /// Signer configuration file (defaults to SIGNER_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file, overriding the configuration
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write an interchange document
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only export these validators
        #[arg(long = "pubkey")]
        pubkeys: Vec<PublicKey>,
    },

    /// Read an interchange document
    Import {
        /// Interchange file
        input: PathBuf,
    },

    /// Delete history older than the retention window
    Prune {
        #[arg(long)]
        epochs_to_keep: Option<u64>,

        #[arg(long)]
        slots_per_epoch: Option<u64>,
    },

    /// Register validators so they may sign
    Register {
        #[arg(required = true)]
        pubkeys: Vec<PublicKey>,
    },

    /// Allow a registered validator to sign again
    Enable { pubkey: PublicKey },

    /// Stop a registered validator from signing
    Disable { pubkey: PublicKey },

    /// Inspect or change the signing ceiling
    HighWatermark {
        #[command(subcommand)]
        action: HighWatermarkAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum HighWatermarkAction {
    /// Print the current high watermark
    Get,

    /// Set the high watermark; at least one bound is required
    Set {
        #[arg(long)]
        slot: Option<u64>,

        #[arg(long)]
        epoch: Option<u64>,
    },

    /// Remove the high watermark
    Delete,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init("warn")?;

    let mut config =
        SignerConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db) = args.db {
        config.database.path = db;
    }

    let stdout = io::stdout();
    commands::run(args.command, config, &mut stdout.lock())
}
