//! # Signer Runtime
//!
//! Entry point of the slashing-protection service. Configuration comes from
//! the file named by `SIGNER_CONFIG` and `SIGNER_*` overrides; logging is
//! controlled with `RUST_LOG`.

use anyhow::{Context, Result};
use signer_runtime::{logging, SignerConfig, SignerRuntime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(logging::DEFAULT_FILTER)?;

    let config = SignerConfig::from_env().context("Failed to load configuration")?;

    let mut runtime = SignerRuntime::new(config)?;
    runtime.start().await?;

    info!("Signer is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    runtime.shutdown().await;
    Ok(())
}
