// crates/skillgate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite State Store
// Description: Durable StateStore backed by SQLite WAL.
// Purpose: Persist context state, events, and facts with integrity hashes.
// Dependencies: rusqlite, serde, serde_json, skillgate-core, thiserror
// ============================================================================

//! ## Overview
//! This crate implements the embedded single-file [`StateStore`] backend.
//! Context rows carry a canonical-JSON hash verified on load (fail closed on
//! corruption); events and facts live in the same three relations the server
//! backend uses, so either backend can serve the same runtime.
//!
//! Security posture: database contents are untrusted on load; hashes are
//! verified before deserialization.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Store implementation.
pub mod store;

pub use store::SqliteStateStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
