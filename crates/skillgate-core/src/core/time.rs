// crates/skillgate-core/src/core/time.rs
// ============================================================================
// Module: Skillgate Time Model
// Description: Canonical timestamp representation for contexts, events, and facts.
// Purpose: Provide deterministic, replayable time values across Skillgate records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Skillgate uses explicit time values embedded in records to keep replay
//! deterministic. The core never reads wall-clock time directly; the runtime
//! supplies timestamps through a clock seam, and tests supply logical values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp in unix-epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads the
///   wall clock.
/// - Monotonicity is a caller responsibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix-epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix-epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns this timestamp advanced by the given number of seconds,
    /// saturating at the representable bounds.
    #[must_use]
    pub const fn saturating_add_seconds(self, seconds: u64) -> Self {
        let millis = seconds.saturating_mul(1_000);
        let millis = if millis > i64::MAX as u64 {
            i64::MAX
        } else {
            millis as i64
        };
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
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

    use super::Timestamp;

    #[test]
    fn saturating_add_advances_by_seconds() {
        let base = Timestamp::from_unix_millis(1_000);
        assert_eq!(base.saturating_add_seconds(2).as_unix_millis(), 3_000);
    }

    #[test]
    fn saturating_add_clamps_at_max() {
        let base = Timestamp::from_unix_millis(i64::MAX - 10);
        assert_eq!(base.saturating_add_seconds(60).as_unix_millis(), i64::MAX);
    }
}
