// crates/skillgate-runtime/src/clock.rs
// ============================================================================
// Module: Clock Seam
// Description: Explicit time source for runtime components.
// Purpose: Keep the core replay-deterministic while the runtime supplies time.
// Dependencies: skillgate-core, std::time
// ============================================================================

//! ## Overview
//! The core data model never reads wall-clock time. The runtime injects a
//! [`Clock`]; production uses [`SystemClock`] and tests use [`FixedClock`]
//! with explicit logical advancement.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use skillgate_core::Timestamp;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Time source injected into runtime components.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            });
        Timestamp::from_unix_millis(millis)
    }
}

/// Deterministic clock for tests, advanced explicitly.
#[derive(Debug, Default)]
pub struct FixedClock {
    /// Current time in unix-epoch milliseconds.
    millis: AtomicI64,
}

impl FixedClock {
    /// Creates a fixed clock at the given instant.
    #[must_use]
    pub fn at(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Advances the clock by the given number of milliseconds.
    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}
