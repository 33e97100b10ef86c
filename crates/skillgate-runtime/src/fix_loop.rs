// crates/skillgate-runtime/src/fix_loop.rs
// ============================================================================
// Module: Bounded Fix Loop
// Description: Fix/validate alternation with structured escalation.
// Purpose: Bound repair attempts and leave an auditable escalation trail.
// Dependencies: serde_json, skillgate-core, crate::{artifacts, executor}
// ============================================================================

//! ## Overview
//! The fix loop alternates a designated fix skill and a validate skill for at
//! most three iterations. A clean validation ends the loop; exhaustion writes
//! `escalation_report.md` carrying the last error set, the diffs attempted,
//! and a human-readable summary, then marks the context escalated.
//!
//! Each iteration persists its own artifacts under an iteration-scoped
//! subpath, so retries at the invocation level never collide.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;

use skillgate_core::CorrelationId;
use skillgate_core::ErrorEntry;
use skillgate_core::ErrorKind;
use skillgate_core::ExecutionStatus;
use skillgate_core::PromotionKind;
use skillgate_core::SkillName;
use skillgate_core::ESCALATION_REPORT;
use skillgate_core::limits::FIX_LOOP_MAX;

use crate::RuntimeError;
use crate::executor::SkillExecutor;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Result of one fix-loop run.
///
/// # Invariants
/// - `iterations` never exceeds the hard loop cap.
#[derive(Debug, Clone, PartialEq)]
pub struct FixLoopOutcome {
    /// Final loop status.
    pub status: ExecutionStatus,
    /// Iterations performed.
    pub iterations: u32,
    /// Error set remaining after the final validation.
    pub remaining_errors: Vec<Value>,
}

// ============================================================================
// SECTION: Fix Loop
// ============================================================================

/// Bounded fix loop driver.
///
/// # Invariants
/// - Runs at most [`FIX_LOOP_MAX`] iterations regardless of contract
///   settings; contracts may only lower the bound.
pub struct FixLoop {
    /// Executor used for fix and validate invocations.
    executor: Arc<SkillExecutor>,
    /// Designated fix skill.
    fix_skill: SkillName,
    /// Designated validate skill.
    validate_skill: SkillName,
}

impl FixLoop {
    /// Creates a loop over the designated fix and validate skills.
    #[must_use]
    pub fn new(executor: Arc<SkillExecutor>, fix_skill: SkillName, validate_skill: SkillName) -> Self {
        Self {
            executor,
            fix_skill,
            validate_skill,
        }
    }

    /// Runs the loop for the correlation id starting from the given errors.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] only for defects; exhaustion is reported
    /// through the outcome status.
    pub fn run(
        &self,
        correlation_id: &CorrelationId,
        initial_errors: Vec<Value>,
    ) -> Result<FixLoopOutcome, RuntimeError> {
        let max_iterations = self.max_iterations();
        let artifacts = self.executor.artifact_store().clone();
        let mut current_errors = initial_errors;
        let mut attempted_diffs: Vec<String> = Vec::new();
        let mut iterations = 0;

        while iterations < max_iterations {
            iterations += 1;

            let fix_inputs = json!({
                "errors": current_errors,
                "iteration": iterations,
            });
            let attempt = json!({
                "iteration": iterations,
                "errors": current_errors,
            });
            artifacts.write_iteration(
                correlation_id,
                iterations,
                "fix_attempt.json",
                &serde_json::to_vec_pretty(&attempt)
                    .map_err(|err| RuntimeError::Internal(format!("fix attempt: {err}")))?,
            )?;

            let fix_result =
                self.executor
                    .execute(&self.fix_skill, fix_inputs, correlation_id, None)?;
            if let Some(diff) = fix_result.outputs.get("diff").and_then(Value::as_str) {
                artifacts.write_iteration(
                    correlation_id,
                    iterations,
                    "diff.patch",
                    diff.as_bytes(),
                )?;
                attempted_diffs.push(diff.to_string());
            }
            if fix_result.status != ExecutionStatus::Success {
                current_errors = errors_as_values(&fix_result.errors);
                continue;
            }

            let validate_result = self.executor.execute(
                &self.validate_skill,
                json!({"iteration": iterations}),
                correlation_id,
                None,
            )?;
            let reported = validation_errors(&validate_result);
            artifacts.write_iteration(
                correlation_id,
                iterations,
                "validation.json",
                &serde_json::to_vec_pretty(&json!({"errors": reported}))
                    .map_err(|err| RuntimeError::Internal(format!("validation: {err}")))?,
            )?;

            if validate_result.status == ExecutionStatus::Success && reported.is_empty() {
                if let Err(err) = self.executor_emit_candidate(correlation_id) {
                    artifacts.append_validation_log(
                        correlation_id,
                        &[format!("promotion emit failed: {err}")],
                    )?;
                }
                return Ok(FixLoopOutcome {
                    status: ExecutionStatus::Success,
                    iterations,
                    remaining_errors: Vec::new(),
                });
            }
            current_errors = reported;
        }

        self.write_escalation_report(correlation_id, &current_errors, &attempted_diffs, iterations)?;
        Ok(FixLoopOutcome {
            status: ExecutionStatus::Escalated,
            iterations,
            remaining_errors: current_errors,
        })
    }

    /// Resolves the iteration bound from the fix skill's contract.
    ///
    /// Contracts may lower the bound; the hard cap always applies.
    fn max_iterations(&self) -> u32 {
        let registry = self.executor.contract_registry();
        let declared = registry
            .get(&self.fix_skill)
            .map(|contract| contract.max_fix_iterations)
            .unwrap_or(FIX_LOOP_MAX);
        let bound = if declared == 0 { FIX_LOOP_MAX } else { declared };
        bound.min(FIX_LOOP_MAX)
    }

    /// Emits a promotion candidate after a successful fix.
    fn executor_emit_candidate(&self, correlation_id: &CorrelationId) -> Result<(), String> {
        self.executor
            .emit_promotion(correlation_id, &self.fix_skill, PromotionKind::Candidate)
            .map_err(|err| err.to_string())
    }

    /// Writes the structured escalation report.
    fn write_escalation_report(
        &self,
        correlation_id: &CorrelationId,
        errors: &[Value],
        diffs: &[String],
        iterations: u32,
    ) -> Result<(), RuntimeError> {
        let mut report = String::new();
        report.push_str("# Escalation Report\n\n");
        report.push_str(&format!(
            "Fix loop exhausted after {iterations} iteration(s) for correlation `{correlation_id}`.\n\n"
        ));
        report.push_str("## Last error set\n\n");
        if errors.is_empty() {
            report.push_str("- (none recorded)\n");
        } else {
            for error in errors {
                report.push_str(&format!("- `{error}`\n"));
            }
        }
        report.push_str("\n## Diffs attempted\n\n");
        if diffs.is_empty() {
            report.push_str("- (no diffs produced)\n");
        } else {
            for (index, diff) in diffs.iter().enumerate() {
                report.push_str(&format!(
                    "### Attempt {}\n\n```diff\n{diff}\n```\n\n",
                    index + 1
                ));
            }
        }
        report.push_str("\n## Summary\n\n");
        report.push_str(
            "Automated repair did not converge within the bounded iteration budget. \
             Human review is required before this correlation can proceed.\n",
        );

        self.executor.artifact_store().write(
            correlation_id,
            ESCALATION_REPORT,
            report.as_bytes(),
        )?;

        let error_entry = ErrorEntry::new(
            ErrorKind::Escalation,
            format!("fix loop exhausted after {iterations} iterations"),
        );
        self.executor
            .mark_escalated(correlation_id, vec![error_entry])?;
        Ok(())
    }
}

/// Extracts the reported validation errors from a validate-skill result.
fn validation_errors(result: &skillgate_core::ExecutionResult) -> Vec<Value> {
    if result.status != ExecutionStatus::Success {
        return errors_as_values(&result.errors);
    }
    result
        .outputs
        .get("errors")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Converts structured error entries to JSON values.
fn errors_as_values(errors: &[ErrorEntry]) -> Vec<Value> {
    errors
        .iter()
        .map(|entry| json!({"kind": entry.kind, "detail": entry.detail}))
        .collect()
}
