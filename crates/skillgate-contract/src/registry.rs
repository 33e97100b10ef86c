// crates/skillgate-contract/src/registry.rs
// ============================================================================
// Module: Contract Registry
// Description: Loads, validates, and serves skill contracts.
// Purpose: Make contracts the only path to skill dispatch.
// Dependencies: crate::{document, schema, types}, skillgate-core, std::fs
// ============================================================================

//! ## Overview
//! The registry loads every `*.md` contract document from a directory,
//! validates the top matter against the embedded schema, deserializes it, and
//! cross-checks the loaded set. A skill cannot be dispatched unless its
//! contract parsed cleanly; cross-reference failures are fatal at startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use skillgate_core::ALLOWLIST;
use skillgate_core::SkillName;
use skillgate_core::limits::FIX_LOOP_MAX;
use skillgate_core::limits::MAX_TURNS_CAP;

use crate::ContractError;
use crate::document::ContractDocument;
use crate::schema::compile_contract_schema;
use crate::schema::validate_top_matter;
use crate::types::SkillContract;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Immutable registry of loaded skill contracts.
///
/// # Invariants
/// - Contracts are immutable once loaded.
/// - Every contract in the registry has passed schema validation and the
///   cross-reference checks.
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    /// Contracts keyed by skill name.
    contracts: BTreeMap<SkillName, SkillContract>,
}

impl ContractRegistry {
    /// Loads all contract documents from a directory.
    ///
    /// Documents are files with an `.md` extension. Cross-reference
    /// validation runs over the complete set before the registry is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] when any document fails to parse or
    /// validate, or when cross-checks fail.
    pub fn load(dir: &Path) -> Result<Self, ContractError> {
        let validator = compile_contract_schema()?;
        let mut contracts = BTreeMap::new();
        let entries = fs::read_dir(dir)
            .map_err(|err| ContractError::Io(format!("read {}: {err}", dir.display())))?;
        let mut paths: Vec<_> = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|err| ContractError::Io(format!("read {}: {err}", dir.display())))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("md") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            let file = path.display().to_string();
            let text = fs::read_to_string(&path)
                .map_err(|err| ContractError::Io(format!("read {file}: {err}")))?;
            let document = ContractDocument::parse(&file, &text)?;
            validate_top_matter(&validator, &file, &document.top_matter)?;
            let contract = document.to_contract(&file)?;
            if contracts.contains_key(&contract.name) {
                return Err(ContractError::CrossRef(format!(
                    "duplicate contract for skill '{}'",
                    contract.name
                )));
            }
            contracts.insert(contract.name.clone(), contract);
        }
        let registry = Self { contracts };
        registry.validate_all()?;
        Ok(registry)
    }

    /// Builds a registry from already-typed contracts, running cross-checks.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::CrossRef`] when the set is inconsistent.
    pub fn from_contracts(contracts: Vec<SkillContract>) -> Result<Self, ContractError> {
        let mut map = BTreeMap::new();
        for contract in contracts {
            if map.contains_key(&contract.name) {
                return Err(ContractError::CrossRef(format!(
                    "duplicate contract for skill '{}'",
                    contract.name
                )));
            }
            map.insert(contract.name.clone(), contract);
        }
        let registry = Self { contracts: map };
        registry.validate_all()?;
        Ok(registry)
    }

    /// Returns the contract for a skill name.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::UnknownSkill`] when no contract is
    /// registered under the name.
    pub fn get(&self, name: &SkillName) -> Result<&SkillContract, ContractError> {
        self.contracts
            .get(name)
            .ok_or_else(|| ContractError::UnknownSkill(name.to_string()))
    }

    /// Returns the registered skill names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&SkillName> {
        self.contracts.keys().collect()
    }

    /// Returns the number of registered contracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Returns true when no contracts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Cross-checks the loaded contract set.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::CrossRef`] on the first inconsistency.
    pub fn validate_all(&self) -> Result<(), ContractError> {
        for contract in self.contracts.values() {
            for dep in &contract.depends_on {
                if !self.contracts.contains_key(dep) {
                    return Err(ContractError::CrossRef(format!(
                        "skill '{}' depends on unknown skill '{dep}'",
                        contract.name
                    )));
                }
                if dep == &contract.name {
                    return Err(ContractError::CrossRef(format!(
                        "skill '{}' depends on itself",
                        contract.name
                    )));
                }
            }
            if contract.max_fix_iterations > FIX_LOOP_MAX {
                return Err(ContractError::CrossRef(format!(
                    "skill '{}' declares {} fix iterations (max {FIX_LOOP_MAX})",
                    contract.name, contract.max_fix_iterations
                )));
            }
            if contract.interaction_outcomes.max_turns > MAX_TURNS_CAP {
                return Err(ContractError::CrossRef(format!(
                    "skill '{}' declares {} turns (max {MAX_TURNS_CAP})",
                    contract.name, contract.interaction_outcomes.max_turns
                )));
            }
            if contract.autonomy_level.requires_allowlist()
                && !contract.requires_artifact(ALLOWLIST)
            {
                return Err(ContractError::CrossRef(format!(
                    "skill '{}' has write autonomy but does not require {ALLOWLIST}",
                    contract.name
                )));
            }
        }
        Ok(())
    }
}
