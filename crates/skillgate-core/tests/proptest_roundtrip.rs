// crates/skillgate-core/tests/proptest_roundtrip.rs
// ============================================================================
// Module: Core Roundtrip Properties
// Description: Property tests for resume tokens and canonical hashing.
// ============================================================================
//! ## Overview
//! Validates that resume tokens roundtrip for arbitrary correlation ids and
//! that canonical hashing is stable under key reordering.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use proptest::prelude::*;
use serde_json::json;
use skillgate_core::CorrelationId;
use skillgate_core::ResumeToken;
use skillgate_core::hashing;
use skillgate_core::hashing::DEFAULT_HASH_ALGORITHM;

proptest! {
    #[test]
    fn resume_tokens_roundtrip(
        id in "[a-zA-Z0-9_:-]{1,40}",
        version in 1_u64..1_000_000,
        turn in 1_u32..1_000,
    ) {
        let token = ResumeToken::new(CorrelationId::new(id.clone()), version, turn);
        let parsed = ResumeToken::parse(&token.encode()).unwrap();
        prop_assert_eq!(parsed.correlation_id.as_str(), id.as_str());
        prop_assert_eq!(parsed.version, version);
        prop_assert_eq!(parsed.turn, turn);
    }

    #[test]
    fn canonical_hash_ignores_key_order(
        a in 0_i64..1_000,
        b in "[a-z]{0,12}",
    ) {
        let left = json!({"alpha": a, "beta": b, "gamma": [a, a]});
        let right = json!({"gamma": [a, a], "beta": b, "alpha": a});
        let dl = hashing::hash_canonical_json(DEFAULT_HASH_ALGORITHM, &left).unwrap();
        let dr = hashing::hash_canonical_json(DEFAULT_HASH_ALGORITHM, &right).unwrap();
        prop_assert_eq!(dl.hex, dr.hex);
    }
}
