//! Registered-validator cache against the database.

mod common;

use std::sync::Arc;

use common::{key, TestContext};
use slashing_protection::{RegisteredValidators, SlashingProtectionError};

#[test]
fn test_register_assigns_stable_ids() {
    let ctx = TestContext::new();
    let registered = ctx.protection.registered_validators();

    registered.register_validators(&[key(1), key(2)]).unwrap();
    let first = registered.validator_id_for(&key(1)).unwrap();
    let second = registered.validator_id_for(&key(2)).unwrap();
    registered.register_validators(&[key(2), key(1)]).unwrap();

    assert_ne!(first, second);
    assert_eq!(registered.validator_id_for(&key(1)), Some(first));
    assert_eq!(registered.public_key_for(second), Some(key(2)));
    assert_eq!(registered.len(), 2);
}

#[test]
fn test_load_rebuilds_from_database() {
    let ctx = TestContext::new();
    ctx.register(&key(1));
    ctx.register(&key(2));

    let reloaded = RegisteredValidators::load(Arc::clone(ctx.protection.database())).unwrap();

    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.validator_id_for(&key(1)), Some(ctx.id(&key(1))));
    assert_eq!(reloaded.all_validator_ids().len(), 2);
}

#[test]
fn test_new_cache_starts_empty() {
    let ctx = TestContext::new();
    ctx.register(&key(1));

    let fresh = RegisteredValidators::new(Arc::clone(ctx.protection.database()));

    assert!(fresh.is_empty());
    assert!(matches!(
        fresh.must_get_validator_id_for(&key(1)),
        Err(SlashingProtectionError::UnregisteredValidator(_))
    ));

    // Registering an existing key finds its row rather than adding one.
    fresh.register_validators(&[key(1)]).unwrap();
    assert_eq!(fresh.validator_id_for(&key(1)), Some(ctx.id(&key(1))));
}
