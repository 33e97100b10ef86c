// crates/skillgate-contract/src/schema.rs
// ============================================================================
// Module: Contract Schema
// Description: Embedded JSON Schema for contract top matter.
// Purpose: Reject nonconforming contract documents before cross-checks run.
// Dependencies: jsonschema, serde_json
// ============================================================================

//! ## Overview
//! The contract top matter is validated against an embedded Draft 2020-12
//! schema before typed deserialization, so error messages name the offending
//! field rather than a serde path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use serde_json::json;

use crate::ContractError;

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Returns the JSON Schema for contract top matter.
#[must_use]
pub fn contract_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://skillgate.dev/schemas/contract.schema.json",
        "title": "Skillgate skill contract top matter",
        "type": "object",
        "required": [
            "name",
            "version",
            "execution_mode",
            "autonomy_level",
            "input_schema",
            "output_schema"
        ],
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "version": { "type": "string", "minLength": 1 },
            "execution_mode": {
                "enum": ["deterministic", "hybrid", "advisor_only"]
            },
            "autonomy_level": {
                "enum": ["read", "suggest", "implement", "commit"]
            },
            "side_effects": {
                "type": "array",
                "items": { "enum": ["fs", "net", "git"] },
                "uniqueItems": true
            },
            "timeout_seconds": { "type": "integer", "minimum": 1 },
            "max_fix_iterations": { "type": "integer", "minimum": 0, "maximum": 3 },
            "idempotency_required": { "type": "boolean" },
            "sync_constraints": {
                "type": "object",
                "properties": {
                    "forbid_async_dependencies": { "type": "boolean" },
                    "require_timeouts": { "type": "boolean" },
                    "forbid_background_tasks": { "type": "boolean" }
                },
                "additionalProperties": false
            },
            "input_schema": { "type": "object" },
            "output_schema": { "type": "object" },
            "required_artifacts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "type"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "type": { "enum": ["json", "patch", "text", "markdown"] }
                    },
                    "additionalProperties": false
                }
            },
            "failure_modes": {
                "type": "array",
                "items": {
                    "enum": [
                        "parse_error",
                        "scope_violation",
                        "validation_error",
                        "timeout",
                        "duplicate_message",
                        "version_conflict"
                    ]
                },
                "uniqueItems": true
            },
            "depends_on": {
                "type": "array",
                "items": { "type": "string", "minLength": 1 }
            },
            "interaction_outcomes": {
                "type": "object",
                "properties": {
                    "allowed_intermediate_states": {
                        "type": "array",
                        "items": {
                            "enum": ["input_required", "delegating", "paused"]
                        }
                    },
                    "max_turns": { "type": "integer", "minimum": 1, "maximum": 20 },
                    "supports_resume": { "type": "boolean" },
                    "input_request_jsonschema": { "type": "object" }
                },
                "additionalProperties": false
            },
            "state_persistence_level": {
                "enum": ["none", "facts_only", "full_events"]
            }
        },
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Compiles the embedded contract schema.
///
/// # Errors
///
/// Returns [`ContractError::Schema`] when the embedded schema fails to
/// compile (a programming defect, surfaced rather than panicking).
pub fn compile_contract_schema() -> Result<Validator, ContractError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&contract_schema())
        .map_err(|err| ContractError::Schema {
            file: "<embedded>".to_string(),
            detail: err.to_string(),
        })
}

/// Validates top matter against the embedded schema.
///
/// # Errors
///
/// Returns [`ContractError::Schema`] carrying the first violation.
pub fn validate_top_matter(
    validator: &Validator,
    file: &str,
    top_matter: &Value,
) -> Result<(), ContractError> {
    if validator.is_valid(top_matter) {
        return Ok(());
    }
    let detail = validator
        .iter_errors(top_matter)
        .next()
        .map_or_else(|| "schema validation failed".to_string(), |err| err.to_string());
    Err(ContractError::Schema {
        file: file.to_string(),
        detail,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
