// crates/skillgate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite State Store
// Description: Durable StateStore backed by SQLite WAL.
// Purpose: Persist context snapshots with deterministic serialization.
// Dependencies: rusqlite, serde, serde_json, skillgate-core, thiserror
// ============================================================================

//! ## Overview
//! Every context write is a compare-and-swap inside a transaction; loads
//! verify the stored canonical-JSON hash and fail closed on mismatch. The
//! event log trims to the retention bound at insert, message deduplication
//! rides on a partial unique index, and pocket facts are capped per bucket
//! with oldest-eviction and TTL filtering on read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

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
use skillgate_core::hashing::DEFAULT_HASH_ALGORITHM;
use skillgate_core::hashing::HashAlgorithm;
use skillgate_core::hashing::canonical_json_bytes;
use skillgate_core::hashing::hash_bytes;
use skillgate_core::limits::MAX_EVENTS;
use skillgate_core::limits::MAX_FACTS_PER_BUCKET;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` state store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config with default pragmas for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw context or fact payloads.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::BackendUnavailable(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) | SqliteStoreError::Invalid(message) => {
                Self::SchemaViolation(message)
            }
        }
    }
}

/// Maps a `rusqlite` error onto the store error type.
fn db_error(error: &rusqlite::Error) -> StoreError {
    StoreError::BackendUnavailable(error.to_string())
}

/// Returns true when the error is a unique-constraint violation.
fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed state store with WAL support.
///
/// # Invariants
/// - Context loads verify stored hashes before deserialization.
/// - Connection access is serialized through a mutex.
/// - Context rows are never deleted.
pub struct SqliteStateStore {
    /// Shared connection guarded by a mutex.
    connection: Mutex<Connection>,
    /// Redaction policy applied on writes.
    redaction: RedactionPolicy,
}

impl SqliteStateStore {
    /// Opens (or creates) the store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// migrated.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Self::open_with_redaction(config, RedactionPolicy::default())
    }

    /// Opens the store with an explicit redaction policy.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// migrated.
    pub fn open_with_redaction(
        config: &SqliteStoreConfig,
        redaction: RedactionPolicy,
    ) -> Result<Self, SqliteStoreError> {
        let connection = Connection::open(&config.path)
            .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        connection
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .execute_batch(&format!(
                "PRAGMA journal_mode = {};",
                config.journal_mode.pragma_value()
            ))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        connection
            .execute_batch(&format!(
                "PRAGMA synchronous = {};",
                config.sync_mode.pragma_value()
            ))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        migrate(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            redaction,
        })
    }

    /// Locks the connection, surfacing poisoning as unavailability.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::BackendUnavailable("store mutex poisoned".to_string()))
    }
}

/// Creates or upgrades the store schema.
fn migrate(connection: &Connection) -> Result<(), SqliteStoreError> {
    let current: i64 = connection
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    if current > SCHEMA_VERSION {
        return Err(SqliteStoreError::VersionMismatch(format!(
            "store schema {current} is newer than supported {SCHEMA_VERSION}"
        )));
    }
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS agent_context_state (
                correlation_id TEXT PRIMARY KEY,
                context_version INTEGER NOT NULL,
                context_json TEXT NOT NULL,
                context_hash TEXT NOT NULL,
                hash_algorithm TEXT NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS agent_conversation_events (
                correlation_id TEXT NOT NULL,
                event_id INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                turn_number INTEGER NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                agent_id TEXT,
                message_id TEXT,
                PRIMARY KEY (correlation_id, event_id)
            );
            CREATE UNIQUE INDEX IF NOT EXISTS agent_conversation_events_message
                ON agent_conversation_events (correlation_id, message_id)
                WHERE message_id IS NOT NULL;
            CREATE TABLE IF NOT EXISTS agent_pocket_facts (
                correlation_id TEXT NOT NULL,
                bucket TEXT NOT NULL,
                key TEXT NOT NULL,
                value_json TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                ttl_seconds INTEGER,
                expires_at_ms INTEGER,
                PRIMARY KEY (correlation_id, bucket, key)
            );",
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: StateStore Implementation
// ============================================================================

impl StateStore for SqliteStateStore {
    fn get_context(&self, correlation_id: &CorrelationId) -> Result<Option<ContextState>, StoreError> {
        let guard = self.lock()?;
        let row: Option<(String, String, String)> = guard
            .query_row(
                "SELECT context_json, context_hash, hash_algorithm
                 FROM agent_context_state WHERE correlation_id = ?1",
                params![correlation_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        let Some((json, hash, algorithm)) = row else {
            return Ok(None);
        };
        let algorithm = HashAlgorithm::parse(&algorithm)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown hash algorithm '{algorithm}'")))?;
        let computed = hash_bytes(algorithm, json.as_bytes());
        if computed.hex != hash {
            return Err(StoreError::Corrupt(format!(
                "context hash mismatch for '{correlation_id}'"
            )));
        }
        let ctx: ContextState = serde_json::from_str(&json)
            .map_err(|err| StoreError::Corrupt(format!("context deserialize: {err}")))?;
        Ok(Some(ctx))
    }

    fn put_context(&self, ctx: &ContextState, expected_version: u64) -> Result<u64, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction()
            .map_err(|err| db_error(&err))?;

        let stored: Option<i64> = tx
            .query_row(
                "SELECT context_version FROM agent_context_state WHERE correlation_id = ?1",
                params![ctx.correlation_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        let found = stored.map(u64::try_from).transpose().map_err(|_| {
            StoreError::Corrupt("negative context version".to_string())
        })?;

        let new_version = match (found, expected_version) {
            (None, 0) => 1,
            (None, expected) => {
                return Err(StoreError::VersionConflict { expected, found: 0 });
            }
            (Some(found), expected) if found == expected && expected > 0 => expected + 1,
            (Some(found), expected) => {
                return Err(StoreError::VersionConflict { expected, found });
            }
        };

        let mut next = ctx.clone();
        next.context_version = new_version;
        let json_bytes = canonical_json_bytes(&next)
            .map_err(|err| StoreError::SchemaViolation(format!("context serialize: {err}")))?;
        let json = String::from_utf8(json_bytes)
            .map_err(|err| StoreError::SchemaViolation(format!("context utf8: {err}")))?;
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, json.as_bytes());

        tx.execute(
            "INSERT INTO agent_context_state
                 (correlation_id, context_version, context_json, context_hash,
                  hash_algorithm, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (correlation_id) DO UPDATE SET
                 context_version = excluded.context_version,
                 context_json = excluded.context_json,
                 context_hash = excluded.context_hash,
                 hash_algorithm = excluded.hash_algorithm,
                 updated_at_ms = excluded.updated_at_ms",
            params![
                next.correlation_id.as_str(),
                i64::try_from(new_version)
                    .map_err(|_| StoreError::SchemaViolation("version overflow".to_string()))?,
                json,
                digest.hex,
                digest.algorithm.as_str(),
                next.updated_at.as_unix_millis(),
            ],
        )
        .map_err(|err| db_error(&err))?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(new_version)
    }

    fn append_event(&self, event: &ConversationEvent) -> Result<u64, StoreError> {
        let mut redacted = event.clone();
        redacted.payload = self.redaction.redacted(&redacted.payload);
        let payload_json = serde_json::to_string(&redacted.payload)
            .map_err(|err| StoreError::SchemaViolation(format!("event payload: {err}")))?;

        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        let next_id: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(event_id), 0) + 1 FROM agent_conversation_events
                 WHERE correlation_id = ?1",
                params![event.correlation_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| db_error(&err))?;
        let insert = tx.execute(
            "INSERT INTO agent_conversation_events
                 (correlation_id, event_id, event_type, payload_json, turn_number,
                  timestamp_ms, agent_id, message_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.correlation_id.as_str(),
                next_id,
                redacted.event_type,
                payload_json,
                i64::from(redacted.turn_number),
                redacted.timestamp.as_unix_millis(),
                redacted.agent_id,
                redacted.message_id.as_ref().map(MessageId::as_str),
            ],
        );
        if let Err(err) = insert {
            if is_constraint_violation(&err) {
                return Err(StoreError::DuplicateMessage(
                    redacted
                        .message_id
                        .map_or_else(String::new, |mid| mid.to_string()),
                ));
            }
            return Err(db_error(&err));
        }
        tx.execute(
            "DELETE FROM agent_conversation_events
             WHERE correlation_id = ?1 AND event_id NOT IN (
                 SELECT event_id FROM agent_conversation_events
                 WHERE correlation_id = ?1
                 ORDER BY event_id DESC LIMIT ?2
             )",
            params![
                event.correlation_id.as_str(),
                i64::try_from(MAX_EVENTS)
                    .map_err(|_| StoreError::SchemaViolation("retention bound".to_string()))?,
            ],
        )
        .map_err(|err| db_error(&err))?;
        tx.commit().map_err(|err| db_error(&err))?;
        u64::try_from(next_id)
            .map_err(|_| StoreError::Corrupt("negative event id".to_string()))
    }

    fn get_events(&self, correlation_id: &CorrelationId) -> Result<Vec<ConversationEvent>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT event_id, event_type, payload_json, turn_number, timestamp_ms,
                        agent_id, message_id
                 FROM agent_conversation_events
                 WHERE correlation_id = ?1 ORDER BY event_id ASC",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(params![correlation_id.as_str()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })
            .map_err(|err| db_error(&err))?;

        let mut events = Vec::new();
        for row in rows {
            let (event_id, event_type, payload_json, turn_number, timestamp_ms, agent_id, message_id) =
                row.map_err(|err| db_error(&err))?;
            let payload = serde_json::from_str(&payload_json)
                .map_err(|err| StoreError::Corrupt(format!("event payload: {err}")))?;
            events.push(ConversationEvent {
                event_id: u64::try_from(event_id)
                    .map_err(|_| StoreError::Corrupt("negative event id".to_string()))?,
                correlation_id: correlation_id.clone(),
                event_type,
                payload,
                turn_number: u32::try_from(turn_number)
                    .map_err(|_| StoreError::Corrupt("negative turn".to_string()))?,
                timestamp: Timestamp::from_unix_millis(timestamp_ms),
                agent_id,
                message_id: message_id.map(MessageId::new),
            });
        }
        Ok(events)
    }

    fn record_message(
        &self,
        correlation_id: &CorrelationId,
        message_id: &MessageId,
        turn_number: u32,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let marker = ConversationEvent::new(
            correlation_id.clone(),
            "message_received",
            serde_json::Value::Null,
            turn_number,
            now,
        )
        .with_message_id(message_id.clone());
        self.append_event(&marker).map(|_| ())
    }

    fn put_fact(&self, fact: &PocketFact) -> Result<(), StoreError> {
        let value = self.redaction.redacted(&fact.value);
        let value_json = serde_json::to_string(&value)
            .map_err(|err| StoreError::SchemaViolation(format!("fact value: {err}")))?;

        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;

        // Opportunistic GC relative to the write timestamp.
        tx.execute(
            "DELETE FROM agent_pocket_facts
             WHERE correlation_id = ?1 AND bucket = ?2
               AND expires_at_ms IS NOT NULL AND expires_at_ms <= ?3",
            params![
                fact.correlation_id.as_str(),
                fact.bucket.as_str(),
                fact.timestamp.as_unix_millis(),
            ],
        )
        .map_err(|err| db_error(&err))?;

        tx.execute(
            "INSERT INTO agent_pocket_facts
                 (correlation_id, bucket, key, value_json, timestamp_ms,
                  ttl_seconds, expires_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (correlation_id, bucket, key) DO UPDATE SET
                 value_json = excluded.value_json,
                 timestamp_ms = excluded.timestamp_ms,
                 ttl_seconds = excluded.ttl_seconds,
                 expires_at_ms = excluded.expires_at_ms",
            params![
                fact.correlation_id.as_str(),
                fact.bucket.as_str(),
                fact.key,
                value_json,
                fact.timestamp.as_unix_millis(),
                fact.ttl_seconds.map(i64::try_from).transpose().map_err(
                    |_| StoreError::SchemaViolation("ttl overflow".to_string())
                )?,
                fact.expires_at.map(Timestamp::as_unix_millis),
            ],
        )
        .map_err(|err| db_error(&err))?;

        // Per-bucket cap with oldest-eviction by write timestamp.
        tx.execute(
            "DELETE FROM agent_pocket_facts
             WHERE correlation_id = ?1 AND bucket = ?2 AND key NOT IN (
                 SELECT key FROM agent_pocket_facts
                 WHERE correlation_id = ?1 AND bucket = ?2
                 ORDER BY timestamp_ms DESC, key DESC LIMIT ?3
             )",
            params![
                fact.correlation_id.as_str(),
                fact.bucket.as_str(),
                i64::try_from(MAX_FACTS_PER_BUCKET)
                    .map_err(|_| StoreError::SchemaViolation("fact cap".to_string()))?,
            ],
        )
        .map_err(|err| db_error(&err))?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(())
    }

    fn get_facts(
        &self,
        correlation_id: &CorrelationId,
        bucket: &BucketId,
        now: Timestamp,
    ) -> Result<Vec<PocketFact>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT key, value_json, timestamp_ms, ttl_seconds, expires_at_ms
                 FROM agent_pocket_facts
                 WHERE correlation_id = ?1 AND bucket = ?2
                   AND (expires_at_ms IS NULL OR expires_at_ms > ?3)
                 ORDER BY timestamp_ms ASC, key ASC",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(
                params![
                    correlation_id.as_str(),
                    bucket.as_str(),
                    now.as_unix_millis()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                },
            )
            .map_err(|err| db_error(&err))?;

        let mut facts = Vec::new();
        for row in rows {
            let (key, value_json, timestamp_ms, ttl_seconds, expires_at_ms) =
                row.map_err(|err| db_error(&err))?;
            let value = serde_json::from_str(&value_json)
                .map_err(|err| StoreError::Corrupt(format!("fact value: {err}")))?;
            facts.push(PocketFact {
                correlation_id: correlation_id.clone(),
                bucket: bucket.clone(),
                key,
                value,
                timestamp: Timestamp::from_unix_millis(timestamp_ms),
                ttl_seconds: ttl_seconds
                    .map(u64::try_from)
                    .transpose()
                    .map_err(|_| StoreError::Corrupt("negative ttl".to_string()))?,
                expires_at: expires_at_ms.map(Timestamp::from_unix_millis),
            });
        }
        Ok(facts)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|err| db_error(&err))
    }
}
