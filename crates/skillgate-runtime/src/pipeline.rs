// crates/skillgate-runtime/src/pipeline.rs
// ============================================================================
// Module: Pipeline Driver
// Description: Fixed-order chaining of skills through the agent adapter.
// Purpose: Drive a correlation through the declared skill graph.
// Dependencies: serde_json, skillgate-contract, skillgate-core, crate::adapter
// ============================================================================

//! ## Overview
//! The pipeline driver derives a topological order from the contracts'
//! `depends_on` edges and invokes each skill through the adapter, stopping at
//! the first non-completed state. Each step receives the prior step's
//! outputs under `prior_outputs`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use skillgate_contract::ContractRegistry;
use skillgate_core::AgentResponse;
use skillgate_core::CorrelationId;
use skillgate_core::SkillName;
use skillgate_core::TaskState;

use crate::RuntimeError;
use crate::adapter::AgentAdapter;
use crate::adapter::Invocation;

// ============================================================================
// SECTION: Topological Order
// ============================================================================

/// Derives a dependency-respecting order over all registered skills.
///
/// # Errors
///
/// Returns [`RuntimeError::Internal`] when the dependency graph contains a
/// cycle (cross-checks reject self-dependencies, but longer cycles surface
/// here).
pub fn topological_order(registry: &ContractRegistry) -> Result<Vec<SkillName>, RuntimeError> {
    let names: Vec<SkillName> = registry.names().into_iter().cloned().collect();
    let mut indegree: BTreeMap<SkillName, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<SkillName, Vec<SkillName>> = BTreeMap::new();
    for name in &names {
        let contract = registry.get(name)?;
        indegree.insert(name.clone(), contract.depends_on.len());
        for dep in &contract.depends_on {
            dependents.entry(dep.clone()).or_default().push(name.clone());
        }
    }

    let mut ready: Vec<SkillName> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| name.clone())
        .collect();
    let mut order = Vec::with_capacity(names.len());
    let mut seen: BTreeSet<SkillName> = BTreeSet::new();

    while let Some(name) = ready.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        order.push(name.clone());
        if let Some(children) = dependents.get(&name) {
            for child in children.clone() {
                if let Some(degree) = indegree.get_mut(&child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.push(child);
                    }
                }
            }
        }
    }

    if order.len() != names.len() {
        return Err(RuntimeError::Internal(
            "skill dependency graph contains a cycle".to_string(),
        ));
    }
    Ok(order)
}

// ============================================================================
// SECTION: Driver
// ============================================================================

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Skills invoked, in order.
    pub invoked: Vec<SkillName>,
    /// Response of the final invocation.
    pub last_response: Option<AgentResponse>,
}

/// Fixed-order pipeline driver over the adapter.
pub struct PipelineDriver {
    /// Adapter used for every invocation.
    adapter: Arc<AgentAdapter>,
    /// Topological skill order.
    order: Vec<SkillName>,
}

impl PipelineDriver {
    /// Creates a driver over the registry's full topological order.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the dependency graph is cyclic.
    pub fn from_registry(
        adapter: Arc<AgentAdapter>,
        registry: &ContractRegistry,
    ) -> Result<Self, RuntimeError> {
        Ok(Self {
            adapter,
            order: topological_order(registry)?,
        })
    }

    /// Creates a driver over an explicit skill order.
    #[must_use]
    pub fn with_order(adapter: Arc<AgentAdapter>, order: Vec<SkillName>) -> Self {
        Self { adapter, order }
    }

    /// Returns the driver's skill order.
    #[must_use]
    pub fn order(&self) -> &[SkillName] {
        &self.order
    }

    /// Runs the pipeline, stopping at the first non-completed state.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] for defects; policy outcomes end the run and
    /// are reported through the final response.
    pub fn run(
        &self,
        correlation_id: &CorrelationId,
        initial_inputs: Value,
    ) -> Result<PipelineRun, RuntimeError> {
        let mut invoked = Vec::new();
        let mut last_response = None;
        let mut prior_outputs = Value::Null;

        for skill in &self.order {
            let mut inputs = initial_inputs.clone();
            if let Value::Object(map) = &mut inputs {
                map.insert("prior_outputs".to_string(), prior_outputs.clone());
            }
            let response = self.adapter.invoke(Invocation::new(
                skill.clone(),
                inputs,
                correlation_id.clone(),
            ))?;
            invoked.push(skill.clone());
            let state = response.state;
            prior_outputs = response.outputs.clone();
            last_response = Some(response);
            if state != TaskState::Completed {
                break;
            }
        }

        Ok(PipelineRun {
            invoked,
            last_response,
        })
    }
}
