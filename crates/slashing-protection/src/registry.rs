//! # Registered Validators
//!
//! In-memory bidirectional map between public keys and validator ids.
//!
//! The database is the authority; the map is rebuilt from a full scan when
//! loaded and updated only after the registering transaction has committed.
//! Lookups take a shared read lock, updates an exclusive one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::PublicKey;
use tracing::{debug, info};

use crate::domain::ValidatorId;
use crate::error::{SlashingProtectionError, SlashingProtectionResult};
use crate::storage::dao::validators;
use crate::storage::{Database, IsolationLevel};

#[derive(Debug, Default)]
struct ValidatorIndex {
    by_key: HashMap<PublicKey, ValidatorId>,
    by_id: HashMap<ValidatorId, PublicKey>,
}

impl ValidatorIndex {
    fn insert(&mut self, public_key: PublicKey, id: ValidatorId) {
        self.by_id.insert(id, public_key.clone());
        self.by_key.insert(public_key, id);
    }
}

/// Cache of registered validators backed by the `validators` table.
pub struct RegisteredValidators {
    db: Arc<Database>,
    index: RwLock<ValidatorIndex>,
}

impl RegisteredValidators {
    /// Empty cache; nothing is registered until [`Self::load`] or
    /// [`Self::register_validators`] runs.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            index: RwLock::new(ValidatorIndex::default()),
        }
    }

    /// Cache rebuilt from every validator row in the database.
    pub fn load(db: Arc<Database>) -> SlashingProtectionResult<Self> {
        let rows = db.in_transaction(IsolationLevel::Snapshot, |tx| validators::find_all(tx))?;
        let mut index = ValidatorIndex::default();
        for validator in rows {
            index.insert(validator.public_key, validator.id);
        }
        info!(count = index.by_id.len(), "Loaded registered validators");
        Ok(Self {
            db,
            index: RwLock::new(index),
        })
    }

    /// Register keys, inserting rows for unknown ones. Idempotent.
    pub fn register_validators(&self, public_keys: &[PublicKey]) -> SlashingProtectionResult<()> {
        let registered = self.db.in_transaction(IsolationLevel::Serializable, |tx| {
            public_keys
                .iter()
                .map(|key| validators::insert_if_not_exists(tx, key))
                .collect::<SlashingProtectionResult<Vec<_>>>()
        })?;

        let mut index = self.index.write();
        for validator in registered {
            debug!(validator_id = %validator.id, public_key = %validator.public_key, "Registered validator");
            index.insert(validator.public_key, validator.id);
        }
        Ok(())
    }

    pub fn validator_id_for(&self, public_key: &PublicKey) -> Option<ValidatorId> {
        self.index.read().by_key.get(public_key).copied()
    }

    pub fn must_get_validator_id_for(
        &self,
        public_key: &PublicKey,
    ) -> SlashingProtectionResult<ValidatorId> {
        self.validator_id_for(public_key)
            .ok_or_else(|| SlashingProtectionError::UnregisteredValidator(public_key.clone()))
    }

    pub fn public_key_for(&self, id: ValidatorId) -> Option<PublicKey> {
        self.index.read().by_id.get(&id).cloned()
    }

    pub fn all_validator_ids(&self) -> HashSet<ValidatorId> {
        self.index.read().by_id.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
