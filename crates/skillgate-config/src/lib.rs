// crates/skillgate-config/src/lib.rs
// ============================================================================
// Module: Skillgate Configuration
// Description: Runtime settings from TOML files and environment variables.
// Purpose: Validate deployment settings before the runtime starts.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Settings load from an optional TOML file and are overridden by the
//! environment: `STATE_STORE_BACKEND` selects the embedded or server store,
//! `DATABASE_URL` configures the server backend, and `ROUTER_ENABLED`
//! (default false) controls delegation demotion. Validation fails closed:
//! a server backend without a database URL is rejected at startup.
//!
//! Security posture: configuration values are untrusted input; the database
//! URL is never logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Environment Names
// ============================================================================

/// Selects the state store backend (`embedded` or `server`).
pub const STATE_STORE_BACKEND_ENV: &str = "STATE_STORE_BACKEND";
/// Connection string for the server backend.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Enables cross-agent routing (`true` or `false`, default false).
pub const ROUTER_ENABLED_ENV: &str = "ROUTER_ENABLED";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed the database URL.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Settings file could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Settings are inconsistent.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Backend Selection
// ============================================================================

/// State store backend selection.
///
/// # Invariants
/// - Wire labels are stable snake_case strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateStoreBackend {
    /// Embedded single-file backend for development.
    #[default]
    Embedded,
    /// Client-server backend for multi-worker production.
    Server,
}

impl StateStoreBackend {
    /// Parses the environment label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "embedded" => Some(Self::Embedded),
            "server" => Some(Self::Server),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Validated runtime settings.
///
/// # Invariants
/// - `backend == Server` implies `database_url` is present.
/// - `router_enabled` defaults to false.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSettings {
    /// State store backend.
    #[serde(default)]
    pub backend: StateStoreBackend,
    /// Connection string for the server backend.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Whether cross-agent routing is enabled.
    #[serde(default)]
    pub router_enabled: bool,
    /// Root directory for correlation-scoped artifacts.
    #[serde(default = "default_artifacts_root")]
    pub artifacts_root: PathBuf,
    /// Directory holding skill contract documents.
    #[serde(default = "default_contracts_dir")]
    pub contracts_dir: PathBuf,
    /// Path of the embedded store database file.
    #[serde(default = "default_embedded_path")]
    pub embedded_store_path: PathBuf,
    /// Additional secret key names for redaction.
    #[serde(default)]
    pub redact_keys: Vec<String>,
    /// Additional secret value prefixes for redaction.
    #[serde(default)]
    pub redact_prefixes: Vec<String>,
}

/// Returns the default artifacts root.
fn default_artifacts_root() -> PathBuf {
    PathBuf::from("artifacts")
}

/// Returns the default contracts directory.
fn default_contracts_dir() -> PathBuf {
    PathBuf::from("skills")
}

/// Returns the default embedded store path.
fn default_embedded_path() -> PathBuf {
    PathBuf::from("skillgate.db")
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            backend: StateStoreBackend::Embedded,
            database_url: None,
            router_enabled: false,
            artifacts_root: default_artifacts_root(),
            contracts_dir: default_contracts_dir(),
            embedded_store_path: default_embedded_path(),
            redact_keys: Vec::new(),
            redact_prefixes: Vec::new(),
        }
    }
}

impl RuntimeSettings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or
    /// the settings are inconsistent.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        let settings: Self =
            toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Applies environment overrides from the given variable map.
    ///
    /// The map form keeps the function deterministic for tests; production
    /// callers pass `std::env::vars().collect()`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable has an unknown
    /// value or the combined settings are inconsistent.
    pub fn with_env(mut self, env: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        if let Some(label) = env.get(STATE_STORE_BACKEND_ENV) {
            self.backend = StateStoreBackend::parse(label).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "{STATE_STORE_BACKEND_ENV} must be 'embedded' or 'server', got '{label}'"
                ))
            })?;
        }
        if let Some(url) = env.get(DATABASE_URL_ENV) {
            self.database_url = Some(url.clone());
        }
        if let Some(flag) = env.get(ROUTER_ENABLED_ENV) {
            self.router_enabled = match flag.as_str() {
                "true" => true,
                "false" => false,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "{ROUTER_ENABLED_ENV} must be 'true' or 'false', got '{other}'"
                    )));
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    /// Validates cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the settings are inconsistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StateStoreBackend::Server && self.database_url.is_none() {
            return Err(ConfigError::Invalid(format!(
                "server backend requires {DATABASE_URL_ENV}"
            )));
        }
        Ok(())
    }
}

/// Returns an example settings file for documentation and tests.
#[must_use]
pub fn settings_toml_example() -> &'static str {
    r#"# Skillgate runtime settings
backend = "embedded"
router_enabled = false
artifacts_root = "artifacts"
contracts_dir = "skills"
embedded_store_path = "skillgate.db"
redact_keys = []
redact_prefixes = []
"#
}

// ============================================================================
// SECTION: Tests
// ============================================================================
