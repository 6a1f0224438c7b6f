//! Property tests: whatever the request order, the recorded history never
//! contains a double vote, a surround vote or a double proposal.

mod common;

use common::{key, root, TestContext};
use proptest::prelude::*;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(16);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

prop_compose! {
    /// The root byte encodes source and target, so equal roots mean equal
    /// attestation data.
    fn arb_attestation()(source in 0u64..12, span in 0u64..6, variant in 0u64..3)
        -> (u64, u64, u8)
    {
        (source, source + span, ((source * 6 + span) * 3 + variant) as u8)
    }
}

fn slashable(a: (u64, u64, u8), b: (u64, u64, u8)) -> bool {
    let double_vote = a.1 == b.1 && a.2 != b.2;
    let surround = (a.0 < b.0 && b.1 < a.1) || (b.0 < a.0 && a.1 < b.1);
    double_vote || surround
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn allowed_attestations_are_never_slashable(
        requests in prop::collection::vec(arb_attestation(), 1..24)
    ) {
        let ctx = TestContext::new();
        let validator = key(1);
        let id = ctx.register(&validator);

        let mut allowed: Vec<(u64, u64, u8)> = Vec::new();
        for request in requests {
            let (source, target, signing_root) = request;
            let expected = allowed.iter().all(|previous| !slashable(*previous, request));
            let actual = ctx.sign_attestation(&validator, root(signing_root), source, target);
            prop_assert_eq!(actual, expected, "request {:?} after {:?}", request, allowed);
            if actual {
                allowed.push(request);
            }
        }

        let stored = ctx.attestations(id);
        for (i, a) in stored.iter().enumerate() {
            for b in &stored[i + 1..] {
                prop_assert!(a.target_epoch != b.target_epoch);
                prop_assert!(!a.surrounds(b.source_epoch, b.target_epoch));
                prop_assert!(!a.is_surrounded_by(b.source_epoch, b.target_epoch));
            }
        }
    }

    #[test]
    fn at_most_one_block_root_per_slot(
        requests in prop::collection::vec((0u64..8, 0u8..3), 1..24)
    ) {
        let ctx = TestContext::new();
        let validator = key(1);
        let id = ctx.register(&validator);

        let mut first_root = std::collections::HashMap::new();
        for (slot, signing_root) in requests {
            let expected = *first_root.entry(slot).or_insert(signing_root) == signing_root;
            prop_assert_eq!(ctx.sign_block(&validator, root(signing_root), slot), expected);
        }

        let stored = ctx.blocks(id);
        prop_assert_eq!(stored.len(), first_root.len());
        for block in stored {
            prop_assert_eq!(block.signing_root, Some(root(first_root[&block.slot])));
        }
    }
}
