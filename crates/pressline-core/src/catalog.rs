//! Workflow definitions and the register-once catalog.
//!
//! The catalog owns every registered `WorkflowDefinition`; definitions are
//! validated on registration and immutable afterwards. Step order is fixed
//! at definition time.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use thiserror::Error;

use crate::context::INPUT_KEY;
use crate::step::StepDefinition;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from definition registration and lookup.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Structural validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// A definition with this id is already registered.
    #[error("definition '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No definition with this id.
    #[error("unknown definition '{0}'")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// Input contract
// ---------------------------------------------------------------------------

/// Declared shape of a definition's accepted input.
///
/// Enforced at submission time only for required top-level fields; anything
/// deeper is the composing caller's contract, not re-validated internally.
#[derive(Debug, Clone, Default)]
pub struct InputContract {
    /// Top-level fields the input object must carry (non-null).
    pub required: Vec<String>,
}

impl InputContract {
    pub fn required(fields: &[&str]) -> Self {
        Self {
            required: fields.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Check an input against the contract. Returns the missing field names.
    pub fn missing_fields(&self, input: &Value) -> Vec<String> {
        self.required
            .iter()
            .filter(|field| input.get(field.as_str()).is_none_or(Value::is_null))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Workflow definition
// ---------------------------------------------------------------------------

/// An ordered step pipeline, immutable once registered.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    /// Catalog key, e.g. `"content-audit"`.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Ordered steps; execution order equals this order, always.
    pub steps: Vec<StepDefinition>,
    /// Declared input shape, checked before any step runs.
    pub input_contract: InputContract,
}

/// Validate structural constraints on a definition.
///
/// Checks:
/// - Id is non-empty and contains only alphanumeric characters and hyphens
/// - At least one step exists
/// - All step ids are non-empty and unique
/// - No step uses the reserved `input` context key as its id
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), CatalogError> {
    if def.id.is_empty() {
        return Err(CatalogError::Validation(
            "definition id must not be empty".to_string(),
        ));
    }
    if !def.id.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(CatalogError::Validation(format!(
            "definition id '{}' contains invalid characters (only alphanumeric and hyphens allowed)",
            def.id
        )));
    }

    if def.steps.is_empty() {
        return Err(CatalogError::Validation(
            "definition must have at least one step".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for step in &def.steps {
        if step.id.is_empty() {
            return Err(CatalogError::Validation(
                "step id must not be empty".to_string(),
            ));
        }
        if step.id == INPUT_KEY {
            return Err(CatalogError::Validation(format!(
                "step id '{INPUT_KEY}' is reserved for the original workflow input"
            )));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(CatalogError::Validation(format!(
                "duplicate step id '{}'",
                step.id
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Register-once catalog of workflow definitions.
#[derive(Debug, Default)]
pub struct WorkflowCatalog {
    definitions: DashMap<String, Arc<WorkflowDefinition>>,
}

impl WorkflowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition. Rejects duplicate ids.
    pub fn register(&self, def: WorkflowDefinition) -> Result<(), CatalogError> {
        validate_definition(&def)?;
        match self.definitions.entry(def.id.clone()) {
            Entry::Occupied(_) => Err(CatalogError::AlreadyRegistered(def.id)),
            Entry::Vacant(slot) => {
                tracing::debug!(definition_id = def.id.as_str(), steps = def.steps.len(), "registered workflow definition");
                slot.insert(Arc::new(def));
                Ok(())
            }
        }
    }

    /// Look up a definition by id.
    pub fn get(&self, id: &str) -> Result<Arc<WorkflowDefinition>, CatalogError> {
        self.definitions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Ids of all registered definitions, sorted.
    pub fn definition_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .definitions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
