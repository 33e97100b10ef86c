// crates/skillgate-contract/src/document.rs
// ============================================================================
// Module: Contract Documents
// Description: Markdown contract documents with YAML top matter.
// Purpose: Parse the declarative top matter while preserving the prose body.
// Dependencies: serde_json, serde_yaml, crate::types
// ============================================================================

//! ## Overview
//! Each skill is accompanied by a markdown document whose top matter (a YAML
//! block delimited by `---` lines at the start of the file) carries the
//! contract fields. The registry accepts the document verbatim; the prose
//! body is not interpreted by the runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::ContractError;
use crate::types::SkillContract;

// ============================================================================
// SECTION: Document
// ============================================================================

/// A parsed contract document.
///
/// # Invariants
/// - `top_matter` is the YAML block converted to a JSON value for schema
///   validation.
/// - `body` is the untouched markdown prose after the closing delimiter.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractDocument {
    /// Top matter as a JSON value.
    pub top_matter: Value,
    /// Markdown body after the top matter.
    pub body: String,
}

impl ContractDocument {
    /// Parses a contract document from its full text.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Parse`] when the top matter is missing,
    /// unterminated, or not valid YAML.
    pub fn parse(file: &str, text: &str) -> Result<Self, ContractError> {
        let normalized = text.replace("\r\n", "\n");
        let rest = normalized
            .strip_prefix("---\n")
            .ok_or_else(|| parse_error(file, "document must start with a `---` top matter block"))?;
        let Some((front, body)) = rest.split_once("\n---") else {
            return Err(parse_error(file, "top matter block is unterminated"));
        };
        let body = body.strip_prefix('\n').unwrap_or(body);
        let top_matter: Value = serde_yaml::from_str(front)
            .map_err(|err| parse_error(file, format!("invalid top matter yaml: {err}")))?;
        if !top_matter.is_object() {
            return Err(parse_error(file, "top matter must be a mapping"));
        }
        Ok(Self {
            top_matter,
            body: body.to_string(),
        })
    }

    /// Deserializes the top matter into a typed contract.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Parse`] when required fields are missing or
    /// mistyped.
    pub fn to_contract(&self, file: &str) -> Result<SkillContract, ContractError> {
        serde_json::from_value(self.top_matter.clone())
            .map_err(|err| parse_error(file, format!("invalid contract fields: {err}")))
    }
}

/// Builds a parse error for the given document.
fn parse_error(file: &str, detail: impl Into<String>) -> ContractError {
    ContractError::Parse {
        file: file.to_string(),
        detail: detail.into(),
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

    use super::ContractDocument;
    use crate::ContractError;

    const MINIMAL: &str = "---\n\
name: node-normalize\n\
version: \"1.0\"\n\
execution_mode: deterministic\n\
autonomy_level: read\n\
input_schema:\n  type: object\n\
output_schema:\n  type: object\n\
---\n\
# Node Normalize\n\
Prose describing the skill.\n";

    #[test]
    fn parses_top_matter_and_body() {
        let doc = ContractDocument::parse("node-normalize.md", MINIMAL).unwrap();
        assert_eq!(doc.top_matter["name"], "node-normalize");
        assert!(doc.body.starts_with("# Node Normalize"));
        let contract = doc.to_contract("node-normalize.md").unwrap();
        assert_eq!(contract.name.as_str(), "node-normalize");
        assert_eq!(contract.timeout_seconds, 300);
    }

    #[test]
    fn missing_top_matter_is_rejected() {
        let err = ContractDocument::parse("x.md", "# Just prose\n").unwrap_err();
        assert!(matches!(err, ContractError::Parse { .. }));
    }

    #[test]
    fn unterminated_top_matter_is_rejected() {
        let err = ContractDocument::parse("x.md", "---\nname: a\n").unwrap_err();
        assert!(matches!(err, ContractError::Parse { .. }));
    }

    #[test]
    fn scalar_top_matter_is_rejected() {
        let err = ContractDocument::parse("x.md", "---\njust a string\n---\n").unwrap_err();
        assert!(matches!(err, ContractError::Parse { .. }));
    }
}
