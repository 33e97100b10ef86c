// crates/skillgate-runtime/src/artifacts.rs
// ============================================================================
// Module: Artifact Store
// Description: Correlation-scoped artifact directory writes and reads.
// Purpose: Keep artifact placement deterministic and paths safe.
// Dependencies: skillgate-core, std::fs, thiserror
// ============================================================================

//! ## Overview
//! Artifacts live under `artifacts/<correlation_id>/`, with fix-loop
//! iterations nested under `fix/<iteration>/`. Artifact names are validated
//! as safe relative paths before any write occurs; traversal components and
//! absolute paths are rejected.
//!
//! Security posture: artifact names may originate from contracts and skill
//! output; they are untrusted and validated before use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use skillgate_core::ArtifactLayout;
use skillgate_core::CorrelationId;
use skillgate_core::VALIDATION_LOGS;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Artifact store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    /// Artifact name failed path-safety validation.
    #[error("unsafe artifact path: {0}")]
    UnsafePath(String),
    /// Filesystem operation failed.
    #[error("artifact io error: {path}: {detail}")]
    Io {
        /// Offending path.
        path: String,
        /// Failure detail.
        detail: String,
    },
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Filesystem-backed artifact store.
///
/// # Invariants
/// - All writes land under the configured layout root.
/// - Names are validated as safe relative paths before writes occur.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    /// Directory layout for correlation-scoped artifacts.
    layout: ArtifactLayout,
}

impl FileArtifactStore {
    /// Creates a store rooted at the given artifacts directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: ArtifactLayout::new(root),
        }
    }

    /// Returns the layout used by the store.
    #[must_use]
    pub const fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Returns the artifact directory for a correlation id.
    #[must_use]
    pub fn correlation_dir(&self, correlation_id: &CorrelationId) -> PathBuf {
        self.layout.correlation_dir(correlation_id)
    }

    /// Writes an artifact under the correlation directory.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] when the name is unsafe or the write
    /// fails.
    pub fn write(
        &self,
        correlation_id: &CorrelationId,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, ArtifactStoreError> {
        validate_safe_relative(name)?;
        let path = self.layout.artifact_path(correlation_id, name);
        write_bytes(&path, bytes)?;
        Ok(path)
    }

    /// Writes an artifact under a fix-loop iteration directory.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] when the name is unsafe or the write
    /// fails.
    pub fn write_iteration(
        &self,
        correlation_id: &CorrelationId,
        iteration: u32,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, ArtifactStoreError> {
        validate_safe_relative(name)?;
        let path = self
            .layout
            .iteration_dir(correlation_id, iteration)
            .join(name);
        write_bytes(&path, bytes)?;
        Ok(path)
    }

    /// Reads an artifact, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] when the name is unsafe or the read
    /// fails for reasons other than absence.
    pub fn read(
        &self,
        correlation_id: &CorrelationId,
        name: &str,
    ) -> Result<Option<Vec<u8>>, ArtifactStoreError> {
        validate_safe_relative(name)?;
        let path = self.layout.artifact_path(correlation_id, name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&path, &err)),
        }
    }

    /// Appends lines to the validation log artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] when the write fails.
    pub fn append_validation_log(
        &self,
        correlation_id: &CorrelationId,
        lines: &[String],
    ) -> Result<PathBuf, ArtifactStoreError> {
        let path = self.layout.artifact_path(correlation_id, VALIDATION_LOGS);
        let mut text = match fs::read_to_string(&path) {
            Ok(existing) => existing,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(io_error(&path, &err)),
        };
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        write_bytes(&path, text.as_bytes())?;
        Ok(path)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates that a name is a safe relative path.
fn validate_safe_relative(name: &str) -> Result<(), ArtifactStoreError> {
    if name.is_empty() || name.contains('\\') {
        return Err(ArtifactStoreError::UnsafePath(name.to_string()));
    }
    let path = Path::new(name);
    for component in path.components() {
        match component {
            Component::Normal(part) if !part.is_empty() => {}
            _ => return Err(ArtifactStoreError::UnsafePath(name.to_string())),
        }
    }
    Ok(())
}

/// Creates parent directories and writes the file.
fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), ArtifactStoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error(parent, &err))?;
    }
    fs::write(path, bytes).map_err(|err| io_error(path, &err))
}

/// Maps an I/O error onto the store error type.
fn io_error(path: &Path, err: &std::io::Error) -> ArtifactStoreError {
    ArtifactStoreError::Io {
        path: path.display().to_string(),
        detail: err.to_string(),
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

    use skillgate_core::CorrelationId;

    use super::ArtifactStoreError;
    use super::FileArtifactStore;

    #[test]
    fn writes_and_reads_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let id = CorrelationId::new("job-1");
        store.write(&id, "trace_map.json", b"{}").unwrap();
        assert_eq!(store.read(&id, "trace_map.json").unwrap().unwrap(), b"{}");
        assert!(store.read(&id, "missing.json").unwrap().is_none());
    }

    #[test]
    fn iteration_artifacts_nest_under_fix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let id = CorrelationId::new("job-1");
        let path = store
            .write_iteration(&id, 2, "fix_attempt.json", b"{}")
            .unwrap();
        assert!(path.ends_with("job-1/fix/2/fix_attempt.json"));
    }

    #[test]
    fn traversal_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let id = CorrelationId::new("job-1");
        for name in ["../escape.txt", "/abs.txt", "a/../b.txt", ""] {
            let err = store.write(&id, name, b"x").unwrap_err();
            assert!(matches!(err, ArtifactStoreError::UnsafePath(_)), "{name}");
        }
    }

    #[test]
    fn validation_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let id = CorrelationId::new("job-1");
        store
            .append_validation_log(&id, &["first".to_string()])
            .unwrap();
        store
            .append_validation_log(&id, &["second".to_string()])
            .unwrap();
        let bytes = store.read(&id, "validation_logs.txt").unwrap().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "first\nsecond\n");
    }
}
