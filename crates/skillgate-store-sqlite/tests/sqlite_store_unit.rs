// crates/skillgate-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Durability, CAS, dedupe, and retention tests over a temp db.
// ============================================================================
//! ## Overview
//! Exercises the embedded backend against the same invariants the in-memory
//! store honors: CAS exclusivity, hash-verified loads, bounded retention,
//! TTL filtering, and message deduplication.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use serde_json::json;

use skillgate_core::BucketId;
use skillgate_core::ContextState;
use skillgate_core::ConversationEvent;
use skillgate_core::CorrelationId;
use skillgate_core::MessageId;
use skillgate_core::PocketFact;
use skillgate_core::StateStore;
use skillgate_core::StoreError;
use skillgate_core::TaskState;
use skillgate_core::Timestamp;
use skillgate_core::limits::MAX_EVENTS;
use skillgate_core::limits::MAX_FACTS_PER_BUCKET;
use skillgate_store_sqlite::SqliteStateStore;
use skillgate_store_sqlite::SqliteStoreConfig;

fn ts(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn open_store(dir: &tempfile::TempDir) -> SqliteStateStore {
    let config = SqliteStoreConfig::new(dir.path().join("state.db"));
    SqliteStateStore::open(&config).unwrap()
}

#[test]
fn context_roundtrip_preserves_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let corr = CorrelationId::new("job-1");

    let mut ctx = ContextState::new(corr.clone(), ts(5));
    ctx.set_summary("normalizing node");
    assert_eq!(store.put_context(&ctx, 0).unwrap(), 1);

    let loaded = store.get_context(&corr).unwrap().unwrap();
    assert_eq!(loaded.correlation_id, corr);
    assert_eq!(loaded.context_version, 1);
    assert_eq!(loaded.summary, "normalizing node");
    assert_eq!(loaded.task_state, TaskState::Pending);
}

#[test]
fn cas_conflicts_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let corr = CorrelationId::new("job-1");
    let ctx = ContextState::new(corr.clone(), ts(0));

    store.put_context(&ctx, 0).unwrap();
    assert_eq!(store.put_context(&ctx, 1).unwrap(), 2);

    let err = store.put_context(&ctx, 1).unwrap_err();
    assert_eq!(
        err,
        StoreError::VersionConflict {
            expected: 1,
            found: 2
        }
    );
    let err = store.put_context(&ctx, 0).unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let corr = CorrelationId::new("job-1");
    {
        let store = open_store(&dir);
        let ctx = ContextState::new(corr.clone(), ts(0));
        store.put_context(&ctx, 0).unwrap();
        store
            .append_event(&ConversationEvent::new(
                corr.clone(),
                "turn",
                json!({"status": "success"}),
                1,
                ts(0),
            ))
            .unwrap();
    }
    let store = open_store(&dir);
    assert!(store.get_context(&corr).unwrap().is_some());
    assert_eq!(store.get_events(&corr).unwrap().len(), 1);
}

#[test]
fn event_log_trims_to_retention_bound() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let corr = CorrelationId::new("job-1");
    for i in 0..(MAX_EVENTS + 10) {
        store
            .append_event(&ConversationEvent::new(
                corr.clone(),
                "tick",
                json!({"i": i}),
                1,
                ts(0),
            ))
            .unwrap();
    }
    let events = store.get_events(&corr).unwrap();
    assert_eq!(events.len(), MAX_EVENTS);
    assert_eq!(events[0].payload["i"], 10);
}

#[test]
fn duplicate_messages_are_rejected_by_the_unique_index() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let corr = CorrelationId::new("job-1");
    let message = MessageId::new("m-1");

    store.record_message(&corr, &message, 1, ts(0)).unwrap();
    let err = store.record_message(&corr, &message, 2, ts(1)).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateMessage(_)));

    // A different correlation id may reuse the message id.
    let other = CorrelationId::new("job-2");
    store.record_message(&other, &message, 1, ts(0)).unwrap();
}

#[test]
fn facts_upsert_cap_and_expire() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let corr = CorrelationId::new("job-1");
    let bucket = BucketId::new("scratch");

    for i in 0..(MAX_FACTS_PER_BUCKET + 8) {
        let fact = PocketFact::new(
            corr.clone(),
            bucket.clone(),
            format!("k{i:03}"),
            json!(i),
            ts(i64::try_from(i).unwrap()),
        );
        store.put_fact(&fact).unwrap();
    }
    let facts = store.get_facts(&corr, &bucket, ts(0)).unwrap();
    assert_eq!(facts.len(), MAX_FACTS_PER_BUCKET);
    assert!(facts.iter().all(|fact| fact.key != "k000"));

    let expiring = PocketFact::new(corr.clone(), bucket.clone(), "ttl", json!(1), ts(1_000))
        .with_ttl(10);
    store.put_fact(&expiring).unwrap();
    let live = store.get_facts(&corr, &bucket, ts(2_000)).unwrap();
    assert!(live.iter().any(|fact| fact.key == "ttl"));
    let later = store.get_facts(&corr, &bucket, ts(11_000)).unwrap();
    assert!(later.iter().all(|fact| fact.key != "ttl"));
}

#[test]
fn payloads_are_redacted_before_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let corr = CorrelationId::new("job-1");

    store
        .append_event(&ConversationEvent::new(
            corr.clone(),
            "inputs",
            json!({"password": "hunter2"}),
            1,
            ts(0),
        ))
        .unwrap();
    let events = store.get_events(&corr).unwrap();
    assert_eq!(events[0].payload["password"], "[REDACTED]");

    let fact = PocketFact::new(
        corr.clone(),
        BucketId::new("scratch"),
        "cred",
        json!({"api_key": "sk-123456"}),
        ts(0),
    );
    store.put_fact(&fact).unwrap();
    let facts = store
        .get_facts(&corr, &BucketId::new("scratch"), ts(0))
        .unwrap();
    assert_eq!(facts[0].value["api_key"], "[REDACTED]");
}

#[test]
fn resume_tokens_validate_against_the_stored_version() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let corr = CorrelationId::new("job-1");
    let ctx = ContextState::new(corr.clone(), ts(0));
    store.put_context(&ctx, 0).unwrap();

    let token = store.generate_resume_token(&corr, 1, 1);
    assert!(store.validate_resume_token(&token).unwrap());
    store.put_context(&ctx, 1).unwrap();
    assert!(!store.validate_resume_token(&token).unwrap());
}

#[test]
fn readiness_probe_succeeds_on_an_open_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.readiness().unwrap();
}
