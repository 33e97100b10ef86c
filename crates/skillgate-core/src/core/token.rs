// crates/skillgate-core/src/core/token.rs
// ============================================================================
// Module: Resume Tokens
// Description: Encoding and validation of turn-boundary resume tokens.
// Purpose: Let any worker resume a paused context without a stale read.
// Dependencies: crate::core::identifiers, serde, thiserror
// ============================================================================

//! ## Overview
//! A resume token is issued with every non-terminal response. The wire form
//! is `ctx:<correlation_id>:<version>:<turn>`; it is opaque to callers but
//! structured for validation. Validation compares only the version against
//! the live context, which rejects any token issued before a later write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::CorrelationId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Resume token parse errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResumeTokenError {
    /// The token does not carry the expected `ctx:` prefix.
    #[error("resume token missing ctx prefix")]
    MissingPrefix,
    /// The token does not have the expected field count.
    #[error("resume token malformed: expected ctx:<id>:<version>:<turn>")]
    Malformed,
    /// A numeric field could not be parsed.
    #[error("resume token numeric field invalid: {0}")]
    InvalidNumber(String),
}

// ============================================================================
// SECTION: Token
// ============================================================================

/// Structured resume token.
///
/// # Invariants
/// - `version` refers to the context version at issue time.
/// - Only `version` participates in freshness validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken {
    /// Correlation identifier the token belongs to.
    pub correlation_id: CorrelationId,
    /// Context version at issue time.
    pub version: u64,
    /// Turn number at issue time.
    pub turn: u32,
}

impl ResumeToken {
    /// Creates a token for the given context coordinates.
    #[must_use]
    pub const fn new(correlation_id: CorrelationId, version: u64, turn: u32) -> Self {
        Self {
            correlation_id,
            version,
            turn,
        }
    }

    /// Parses the wire form `ctx:<id>:<version>:<turn>`.
    ///
    /// The correlation id segment may itself contain `:`; the version and
    /// turn are always the two trailing segments.
    ///
    /// # Errors
    ///
    /// Returns [`ResumeTokenError`] when the token is malformed.
    pub fn parse(token: &str) -> Result<Self, ResumeTokenError> {
        let rest = token
            .strip_prefix("ctx:")
            .ok_or(ResumeTokenError::MissingPrefix)?;
        let (head, turn_text) = rest.rsplit_once(':').ok_or(ResumeTokenError::Malformed)?;
        let (id_text, version_text) = head.rsplit_once(':').ok_or(ResumeTokenError::Malformed)?;
        if id_text.is_empty() {
            return Err(ResumeTokenError::Malformed);
        }
        let version: u64 = version_text
            .parse()
            .map_err(|_| ResumeTokenError::InvalidNumber(version_text.to_string()))?;
        let turn: u32 = turn_text
            .parse()
            .map_err(|_| ResumeTokenError::InvalidNumber(turn_text.to_string()))?;
        Ok(Self {
            correlation_id: CorrelationId::new(id_text),
            version,
            turn,
        })
    }

    /// Returns the wire form of the token.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("ctx:{}:{}:{}", self.correlation_id, self.version, self.turn)
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
