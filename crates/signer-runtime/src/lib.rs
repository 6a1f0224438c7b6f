//! # Signer Runtime
//!
//! Hosts slashing protection inside an async service.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (TOML file named by `SIGNER_CONFIG`, then `SIGNER_*`
//!    environment overrides) and validate it
//! 2. Open the protection database; a schema version mismatch is fatal
//! 3. Run one pruning pass if `pruning.at_boot` is set
//! 4. Start the scheduled pruning runner if `pruning.enabled` is set
//! 5. Serve signing decisions through the [`SigningGate`]
//!
//! ## Shutdown
//!
//! The gate is closed first, so every later request is refused, then the
//! background tasks are signalled and awaited.

pub mod config;
pub mod gate;
pub mod logging;
pub mod pruning_runner;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use slashing_protection::{DbSlashingProtection, SlashingProtection};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use config::{ConfigError, SignerConfig};
pub use gate::{SigningGate, SigningGuard};
pub use pruning_runner::PruningRunner;

/// How long shutdown waits for background tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The running signer service.
pub struct SignerRuntime {
    config: SignerConfig,
    protection: Arc<DbSlashingProtection>,
    gate: SigningGate,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SignerRuntime {
    /// Open the protection database described by `config`.
    pub fn new(config: SignerConfig) -> Result<Self> {
        config.validate()?;
        let protection = DbSlashingProtection::open(&config.protection_config())
            .context("Failed to open slashing protection database")?;
        let protection = Arc::new(protection);
        let gate = SigningGate::new(
            Arc::clone(&protection) as Arc<dyn SlashingProtection>,
            config.runtime.max_blocking_workers,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            protection,
            gate,
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        })
    }

    /// Boot-time pruning and background tasks.
    pub async fn start(&mut self) -> Result<()> {
        info!(
            database = %self.config.database.path.display(),
            validators = self.protection.registered_validators().len(),
            "Starting signer runtime"
        );

        let pruning = &self.config.pruning;
        let runner = PruningRunner::new(
            Arc::clone(&self.protection) as Arc<dyn SlashingProtection>,
            pruning.interval(),
        );

        if pruning.at_boot {
            info!("Pruning slashing protection database at boot");
            if runner.prune_once().await.is_none() {
                warn!("Boot-time pruning did not complete");
            }
        }

        if pruning.enabled {
            let shutdown = self.shutdown_rx.clone();
            self.tasks.push(tokio::spawn(async move {
                runner.run(shutdown).await;
            }));
        } else {
            info!("Scheduled pruning disabled");
        }

        info!(
            max_blocking_workers = self.config.runtime.max_blocking_workers,
            "Signer runtime ready"
        );
        Ok(())
    }

    pub fn gate(&self) -> &SigningGate {
        &self.gate
    }

    pub fn protection(&self) -> &Arc<DbSlashingProtection> {
        &self.protection
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Close the gate, stop background tasks and wait for them.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        self.gate.close();

        if self.shutdown_tx.send(true).is_err() {
            warn!("No background task was listening for shutdown");
        }
        for task in self.tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "Background task failed"),
                Err(_) => warn!("Background task did not stop in time"),
            }
        }

        info!("Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Bytes32, PublicKey};

    fn config(dir: &tempfile::TempDir) -> SignerConfig {
        let mut config = SignerConfig::default();
        config.database.path = dir.path().join("sp.db");
        config.runtime.max_blocking_workers = 2;
        config
    }

    #[tokio::test]
    async fn test_runtime_serves_and_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir);
        config.pruning.enabled = true;
        config.pruning.at_boot = true;
        let mut runtime = SignerRuntime::new(config).unwrap();
        runtime.start().await.unwrap();

        let key = PublicKey::from_bytes(vec![1; 48]).unwrap();
        runtime
            .protection()
            .register_validators(&[key.clone()])
            .unwrap();
        let gate = runtime.gate().clone();
        assert!(gate.may_sign_block(key.clone(), Bytes32([1; 32]), 1, Bytes32([4; 32])).await);

        runtime.shutdown().await;

        assert!(gate.is_closed());
        assert!(!gate.may_sign_block(key, Bytes32([1; 32]), 2, Bytes32([4; 32])).await);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir);
        config.runtime.max_blocking_workers = 0;

        assert!(SignerRuntime::new(config).is_err());
    }
}
