// crates/skillgate-core/src/core/hashing.rs
// ============================================================================
// Module: Canonical Hashing
// Description: Canonical JSON serialization and digest helpers.
// Purpose: Provide deterministic hashes for request snapshots and store integrity.
// Dependencies: serde, serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! All integrity hashes in Skillgate are computed over canonical JSON (RFC
//! 8785 / JCS key ordering) so that logically equal payloads hash equally
//! regardless of map iteration order. Stores verify stored hashes on load and
//! fail closed on mismatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::limits::MAX_CANONICAL_JSON_BYTES;

// ============================================================================
// SECTION: Algorithm and Digest
// ============================================================================

/// Supported hash algorithms.
///
/// # Invariants
/// - Labels are stable for persistence and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

/// Default hash algorithm for all Skillgate digests.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

impl HashAlgorithm {
    /// Returns the stable label for the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Parses a stable label into an algorithm.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// Hash digest with its producing algorithm.
///
/// # Invariants
/// - `hex` is lowercase hexadecimal.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HashDigest {
    /// Producing algorithm.
    pub algorithm: HashAlgorithm,
    /// Lowercase hexadecimal digest.
    pub hex: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Canonicalization and hashing errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HashError {
    /// Payload could not be canonicalized.
    #[error("canonical json error: {0}")]
    Canonicalization(String),
    /// Payload exceeds the canonical size limit.
    #[error("canonical payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Serializes a value to canonical JSON bytes.
///
/// # Errors
///
/// Returns [`HashError`] when serialization fails or the payload exceeds the
/// default size limit.
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, HashError> {
    canonical_json_bytes_with_limit(value, MAX_CANONICAL_JSON_BYTES)
}

/// Serializes a value to canonical JSON bytes with an explicit size limit.
///
/// # Errors
///
/// Returns [`HashError`] when serialization fails or the payload exceeds
/// `max_bytes`.
pub fn canonical_json_bytes_with_limit<T: Serialize>(
    value: &T,
    max_bytes: usize,
) -> Result<Vec<u8>, HashError> {
    let bytes =
        serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))?;
    if bytes.len() > max_bytes {
        return Err(HashError::TooLarge {
            max_bytes,
            actual_bytes: bytes.len(),
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Hashes raw bytes with the given algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            let mut hex = String::with_capacity(digest.len() * 2);
            for byte in digest {
                hex.push_str(&format!("{byte:02x}"));
            }
            HashDigest {
                algorithm,
                hex,
            }
        }
    }
}

/// Hashes a value's canonical JSON form.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn hash_canonical_json<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
