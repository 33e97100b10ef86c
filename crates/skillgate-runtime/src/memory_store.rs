// crates/skillgate-runtime/src/memory_store.rs
// ============================================================================
// Module: In-Memory State Store
// Description: Mutex-guarded state store for development and tests.
// Purpose: Provide the full store contract without a database.
// Dependencies: skillgate-core, std::sync
// ============================================================================

//! ## Overview
//! The in-memory store implements the complete [`StateStore`] contract:
//! compare-and-swap on the context version, append-only events with bounded
//! retention, message deduplication through the event relation, and capped,
//! TTL-aware pocket facts. Redaction runs on every write path. Contexts are
//! never deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use skillgate_core::BucketId;
use skillgate_core::ContextState;
use skillgate_core::ConversationEvent;
use skillgate_core::CorrelationId;
use skillgate_core::MessageId;
use skillgate_core::PocketFact;
use skillgate_core::RedactionPolicy;
use skillgate_core::StateStore;
use skillgate_core::StoreError;
use skillgate_core::Timestamp;
use skillgate_core::limits::MAX_EVENTS;
use skillgate_core::limits::MAX_FACTS_PER_BUCKET;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Mutable store state guarded by a single mutex.
#[derive(Debug, Default)]
struct Inner {
    /// Context rows keyed by correlation id.
    contexts: BTreeMap<CorrelationId, ContextState>,
    /// Event logs keyed by correlation id, oldest first.
    events: BTreeMap<CorrelationId, Vec<ConversationEvent>>,
    /// Next event identifier per correlation id.
    next_event_id: BTreeMap<CorrelationId, u64>,
    /// Pocket facts keyed by correlation id and bucket, oldest first.
    facts: BTreeMap<(CorrelationId, BucketId), Vec<PocketFact>>,
}

/// In-memory state store.
///
/// # Invariants
/// - All mutations are serialized through one mutex; CAS semantics match the
///   durable backends.
/// - Context rows are never removed.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    /// Guarded store state.
    inner: Mutex<Inner>,
    /// Redaction policy applied on writes.
    redaction: RedactionPolicy,
}

impl InMemoryStateStore {
    /// Creates an empty store with the default redaction policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with an explicit redaction policy.
    #[must_use]
    pub fn with_redaction(redaction: RedactionPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            redaction,
        }
    }

    /// Locks the store state, surfacing poisoning as unavailability.
    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::BackendUnavailable("store mutex poisoned".to_string()))
    }
}

impl StateStore for InMemoryStateStore {
    fn get_context(&self, correlation_id: &CorrelationId) -> Result<Option<ContextState>, StoreError> {
        Ok(self.lock()?.contexts.get(correlation_id).cloned())
    }

    fn put_context(&self, ctx: &ContextState, expected_version: u64) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let stored_version = inner
            .contexts
            .get(&ctx.correlation_id)
            .map(|stored| stored.context_version);
        match (stored_version, expected_version) {
            (None, 0) => {
                let mut fresh = ctx.clone();
                fresh.context_version = 1;
                inner.contexts.insert(ctx.correlation_id.clone(), fresh);
                Ok(1)
            }
            (None, expected) => Err(StoreError::VersionConflict {
                expected,
                found: 0,
            }),
            (Some(found), expected) if found == expected && expected > 0 => {
                let mut next = ctx.clone();
                next.context_version = expected + 1;
                inner.contexts.insert(ctx.correlation_id.clone(), next);
                Ok(expected + 1)
            }
            (Some(found), expected) => Err(StoreError::VersionConflict { expected, found }),
        }
    }

    fn append_event(&self, event: &ConversationEvent) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let next_id = inner
            .next_event_id
            .entry(event.correlation_id.clone())
            .or_insert(1);
        let event_id = *next_id;
        *next_id += 1;
        let mut stored = event.clone();
        stored.event_id = event_id;
        stored.payload = self.redaction.redacted(&stored.payload);
        let log = inner.events.entry(event.correlation_id.clone()).or_default();
        log.push(stored);
        if log.len() > MAX_EVENTS {
            let excess = log.len() - MAX_EVENTS;
            log.drain(0..excess);
        }
        Ok(event_id)
    }

    fn get_events(&self, correlation_id: &CorrelationId) -> Result<Vec<ConversationEvent>, StoreError> {
        Ok(self
            .lock()?
            .events
            .get(correlation_id)
            .cloned()
            .unwrap_or_default())
    }

    fn record_message(
        &self,
        correlation_id: &CorrelationId,
        message_id: &MessageId,
        turn_number: u32,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        {
            let inner = self.lock()?;
            let duplicate = inner
                .events
                .get(correlation_id)
                .is_some_and(|log| {
                    log.iter()
                        .any(|event| event.message_id.as_ref() == Some(message_id))
                });
            if duplicate {
                return Err(StoreError::DuplicateMessage(message_id.to_string()));
            }
        }
        let marker = ConversationEvent::new(
            correlation_id.clone(),
            "message_received",
            serde_json::Value::Null,
            turn_number,
            now,
        )
        .with_message_id(message_id.clone());
        self.append_event(&marker)?;
        Ok(())
    }

    fn put_fact(&self, fact: &PocketFact) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (fact.correlation_id.clone(), fact.bucket.clone());
        let bucket = inner.facts.entry(key).or_default();
        // Opportunistic GC relative to the write timestamp.
        bucket.retain(|existing| !existing.is_expired(fact.timestamp));
        let mut stored = fact.clone();
        stored.value = self.redaction.redacted(&stored.value);
        if let Some(existing) = bucket.iter_mut().find(|entry| entry.key == fact.key) {
            *existing = stored;
        } else {
            bucket.push(stored);
            if bucket.len() > MAX_FACTS_PER_BUCKET {
                let excess = bucket.len() - MAX_FACTS_PER_BUCKET;
                bucket.drain(0..excess);
            }
        }
        Ok(())
    }

    fn get_facts(
        &self,
        correlation_id: &CorrelationId,
        bucket: &BucketId,
        now: Timestamp,
    ) -> Result<Vec<PocketFact>, StoreError> {
        let mut inner = self.lock()?;
        let key = (correlation_id.clone(), bucket.clone());
        let Some(stored) = inner.facts.get_mut(&key) else {
            return Ok(Vec::new());
        };
        stored.retain(|fact| !fact.is_expired(now));
        Ok(stored.clone())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
