//! # Signing Gate
//!
//! Async front of the blocking decision engine. Each decision runs on a
//! blocking worker; a semaphore bounds how many run at once so a burst of
//! requests cannot exhaust the blocking pool or the connection pool.
//!
//! The gate never reports an error: a closed gate, a panicked worker or a
//! storage failure are all a refusal to sign.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{Epoch, GenesisValidatorsRoot, PublicKey, SigningRoot, Slot};
use slashing_protection::SlashingProtection;
use tokio::sync::Semaphore;
use tracing::error;

/// What the signing handler awaits before producing a signature.
#[async_trait]
pub trait SigningGuard: Send + Sync {
    async fn may_sign_block(
        &self,
        public_key: PublicKey,
        signing_root: SigningRoot,
        slot: Slot,
        genesis_validators_root: GenesisValidatorsRoot,
    ) -> bool;

    async fn may_sign_attestation(
        &self,
        public_key: PublicKey,
        signing_root: SigningRoot,
        source_epoch: Epoch,
        target_epoch: Epoch,
        genesis_validators_root: GenesisValidatorsRoot,
    ) -> bool;
}

/// [`SigningGuard`] over any [`SlashingProtection`] implementation.
#[derive(Clone)]
pub struct SigningGate {
    protection: Arc<dyn SlashingProtection>,
    permits: Arc<Semaphore>,
}

impl SigningGate {
    pub fn new(protection: Arc<dyn SlashingProtection>, max_blocking_workers: usize) -> Self {
        Self {
            protection,
            permits: Arc::new(Semaphore::new(max_blocking_workers)),
        }
    }

    /// Refuse every later request. In-flight decisions complete.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    async fn decide<F>(&self, what: &'static str, decision: F) -> bool
    where
        F: FnOnce(&dyn SlashingProtection) -> bool + Send + 'static,
    {
        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
            error!("{what} denied: signing gate is closed");
            return false;
        };
        let protection = Arc::clone(&self.protection);
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            decision(protection.as_ref())
        });
        match task.await {
            Ok(allowed) => allowed,
            Err(err) => {
                error!(error = %err, "{what} denied: decision task failed");
                false
            }
        }
    }
}

#[async_trait]
impl SigningGuard for SigningGate {
    async fn may_sign_block(
        &self,
        public_key: PublicKey,
        signing_root: SigningRoot,
        slot: Slot,
        genesis_validators_root: GenesisValidatorsRoot,
    ) -> bool {
        self.decide("Block signing", move |protection| {
            protection.may_sign_block(&public_key, &signing_root, slot, &genesis_validators_root)
        })
        .await
    }

    async fn may_sign_attestation(
        &self,
        public_key: PublicKey,
        signing_root: SigningRoot,
        source_epoch: Epoch,
        target_epoch: Epoch,
        genesis_validators_root: GenesisValidatorsRoot,
    ) -> bool {
        self.decide("Attestation signing", move |protection| {
            protection.may_sign_attestation(
                &public_key,
                &signing_root,
                source_epoch,
                target_epoch,
                &genesis_validators_root,
            )
        })
        .await
    }
}
