// crates/skillgate-core/src/core/event.rs
// ============================================================================
// Module: Conversation Events
// Description: Append-only per-correlation event records.
// Purpose: Capture turn evolution for forensics and replay.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Conversation events are append-only and never mutated. The per-correlation
//! log is trimmed to the most recent `MAX_EVENTS` entries at write time, so
//! forensics always see the latest window.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::MessageId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Event Record
// ============================================================================

/// Append-only conversation event.
///
/// # Invariants
/// - `event_id` is assigned by the store and monotonic per correlation.
/// - `payload` is redacted before persistence.
/// - `message_id`, when present, is unique per correlation and used for
///   deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEvent {
    /// Store-assigned monotonic event identifier.
    pub event_id: u64,
    /// Correlation identifier the event belongs to.
    pub correlation_id: CorrelationId,
    /// Free-form event type label.
    pub event_type: String,
    /// Structured, redacted payload.
    pub payload: Value,
    /// Turn number the event was recorded in.
    pub turn_number: u32,
    /// Event timestamp.
    pub timestamp: Timestamp,
    /// Optional agent identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Optional message identifier for deduplication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

impl ConversationEvent {
    /// Creates an event with a store-assigned identifier of zero.
    ///
    /// The store replaces `event_id` on append.
    #[must_use]
    pub fn new(
        correlation_id: CorrelationId,
        event_type: impl Into<String>,
        payload: Value,
        turn_number: u32,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            event_id: 0,
            correlation_id,
            event_type: event_type.into(),
            payload,
            turn_number,
            timestamp,
            agent_id: None,
            message_id: None,
        }
    }

    /// Attaches a message identifier for deduplication.
    #[must_use]
    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Attaches an agent identifier.
    #[must_use]
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}
