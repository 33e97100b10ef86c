// crates/skillgate-core/src/core/fact.rs
// ============================================================================
// Module: Pocket Facts
// Description: Keyed small structured values with optional TTL.
// Purpose: Carry structured intermediate state across turns.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Pocket facts are small keyed values persisted per correlation id and
//! bucket. Upserts replace existing keys; each bucket is capped with
//! oldest-eviction, and expired facts are filtered on read and collected
//! opportunistically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::BucketId;
use crate::core::identifiers::CorrelationId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Fact Record
// ============================================================================

/// Keyed structured value persisted per correlation id.
///
/// # Invariants
/// - `value` is redacted before persistence.
/// - `expires_at` is derived from `timestamp` and `ttl_seconds` at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocketFact {
    /// Correlation identifier the fact belongs to.
    pub correlation_id: CorrelationId,
    /// Bucket namespace.
    pub bucket: BucketId,
    /// Fact key, unique within the bucket.
    pub key: String,
    /// Structured, redacted value.
    pub value: Value,
    /// Write timestamp.
    pub timestamp: Timestamp,
    /// Optional time-to-live in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// Expiry timestamp derived at write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl PocketFact {
    /// Creates a fact without a TTL.
    #[must_use]
    pub fn new(
        correlation_id: CorrelationId,
        bucket: BucketId,
        key: impl Into<String>,
        value: Value,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            correlation_id,
            bucket,
            key: key.into(),
            value,
            timestamp,
            ttl_seconds: None,
            expires_at: None,
        }
    }

    /// Attaches a TTL, deriving the expiry from the write timestamp.
    #[must_use]
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self.expires_at = Some(self.timestamp.saturating_add_seconds(ttl_seconds));
        self
    }

    /// Returns true when the fact is expired at the given instant.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use serde_json::json;

    use super::PocketFact;
    use crate::core::identifiers::BucketId;
    use crate::core::identifiers::CorrelationId;
    use crate::core::time::Timestamp;

    fn fact_at(millis: i64) -> PocketFact {
        PocketFact::new(
            CorrelationId::new("job-1"),
            BucketId::new("scratch"),
            "k",
            json!({"v": 1}),
            Timestamp::from_unix_millis(millis),
        )
    }

    #[test]
    fn fact_without_ttl_never_expires() {
        let fact = fact_at(0);
        assert!(!fact.is_expired(Timestamp::from_unix_millis(i64::MAX)));
    }

    #[test]
    fn fact_with_ttl_expires_at_boundary() {
        let fact = fact_at(1_000).with_ttl(10);
        assert!(!fact.is_expired(Timestamp::from_unix_millis(10_999)));
        assert!(fact.is_expired(Timestamp::from_unix_millis(11_000)));
    }
}
