// crates/skillgate-runtime/tests/store_properties.rs
// ============================================================================
// Module: State Store Properties
// Description: Property tests for CAS, retention, and TTL invariants.
// ============================================================================
//! ## Overview
//! Validates the store-level testable properties: version monotonicity, CAS
//! exclusivity, bounded event retention, bounded fact retention with TTL
//! filtering, and resume-token freshness.

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
use skillgate_core::BucketId;
use skillgate_core::ContextState;
use skillgate_core::ConversationEvent;
use skillgate_core::CorrelationId;
use skillgate_core::PocketFact;
use skillgate_core::StateStore;
use skillgate_core::Timestamp;
use skillgate_core::limits::MAX_EVENTS;
use skillgate_core::limits::MAX_FACTS_PER_BUCKET;
use skillgate_runtime::InMemoryStateStore;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

proptest! {
    /// Property 1: versions observed over time never decrease.
    #[test]
    fn version_monotonicity(updates in 1_usize..20) {
        let store = InMemoryStateStore::new();
        let corr = CorrelationId::new("prop");
        let ctx = ContextState::new(corr.clone(), ts(0));
        store.put_context(&ctx, 0).unwrap();

        let mut last = 1;
        for _ in 0..updates {
            let current = store.get_context(&corr).unwrap().unwrap();
            prop_assert!(current.context_version >= last);
            last = store.put_context(&current, current.context_version).unwrap();
        }
        let final_ctx = store.get_context(&corr).unwrap().unwrap();
        prop_assert!(final_ctx.context_version >= last);
    }

    /// Property 2: of two writes with the same expected version, exactly one
    /// succeeds.
    #[test]
    fn cas_exclusivity(seed in 0_u64..1_000) {
        let store = InMemoryStateStore::new();
        let corr = CorrelationId::new(format!("prop-{seed}"));
        let ctx = ContextState::new(corr.clone(), ts(0));
        store.put_context(&ctx, 0).unwrap();

        let first = store.put_context(&ctx, 1);
        let second = store.put_context(&ctx, 1);
        prop_assert!(first.is_ok() != second.is_ok());
    }

    /// Property 5: the event log is bounded and keeps the most recent.
    #[test]
    fn event_retention(appends in 1_usize..250) {
        let store = InMemoryStateStore::new();
        let corr = CorrelationId::new("prop");
        for i in 0..appends {
            let event = ConversationEvent::new(corr.clone(), "tick", json!({"i": i}), 1, ts(0));
            store.append_event(&event).unwrap();
        }
        let events = store.get_events(&corr).unwrap();
        prop_assert!(events.len() <= MAX_EVENTS);
        prop_assert_eq!(
            events.last().unwrap().payload["i"].as_u64().unwrap(),
            (appends - 1) as u64
        );
    }

    /// Property 6: per-bucket facts are bounded and expired facts are not
    /// retrievable.
    #[test]
    fn fact_retention(count in 1_usize..120, ttl in 1_u64..100) {
        let store = InMemoryStateStore::new();
        let corr = CorrelationId::new("prop");
        let bucket = BucketId::new("b");
        for i in 0..count {
            let fact = PocketFact::new(corr.clone(), bucket.clone(), format!("k{i}"), json!(i), ts(0))
                .with_ttl(ttl);
            store.put_fact(&fact).unwrap();
        }
        let live = store.get_facts(&corr, &bucket, ts(0)).unwrap();
        prop_assert!(live.len() <= MAX_FACTS_PER_BUCKET);

        let after_expiry = store
            .get_facts(&corr, &bucket, ts(0).saturating_add_seconds(ttl))
            .unwrap();
        prop_assert!(after_expiry.is_empty());
    }

    /// Property 4: a token issued at version `v` is invalid at any later
    /// version.
    #[test]
    fn resume_token_freshness(advances in 1_usize..10) {
        let store = InMemoryStateStore::new();
        let corr = CorrelationId::new("prop");
        let ctx = ContextState::new(corr.clone(), ts(0));
        store.put_context(&ctx, 0).unwrap();
        let token = store.generate_resume_token(&corr, 1, 1);
        prop_assert!(store.validate_resume_token(&token).unwrap());

        let mut version = 1;
        for _ in 0..advances {
            let current = store.get_context(&corr).unwrap().unwrap();
            version = store.put_context(&current, current.context_version).unwrap();
            prop_assert!(!store.validate_resume_token(&token).unwrap());
        }
        prop_assert!(version > 1);
    }
}
