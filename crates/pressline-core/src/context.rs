//! Execution context with named step checkpoints.
//!
//! `ExecutionContext` is the per-instance store of every committed step
//! output, addressable by step id. It is seeded with the original workflow
//! input under the reserved `input` key, so any step can recover the
//! original submission even after intermediate transforms have discarded
//! fields -- no manual re-threading through step outputs required.

use indexmap::IndexMap;
use pressline_types::workflow::{ContextEntry, ContextSnapshot};
use serde_json::Value;
use uuid::Uuid;

/// Reserved context key holding the original workflow input.
pub const INPUT_KEY: &str = "input";

/// Errors from context writes.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// A step id was written twice. Silent overwrite is deliberately not
    /// supported; the catalog rejects duplicate ids up front, so this can
    /// only arise from a definition that bypassed validation.
    #[error("duplicate context entry for step '{0}'")]
    DuplicateStep(String),
}

/// Per-instance, insertion-ordered map from step id to committed output.
///
/// Owned and mutated only by the instance's own sequential execution; every
/// observer reads snapshots persisted to the instance registry instead of
/// the live map. Cloning is cheap enough to hand each step handler its own
/// read-only copy.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    workflow_id: String,
    instance_id: Uuid,
    entries: IndexMap<String, Value>,
}

impl ExecutionContext {
    /// Create a context for one instance, seeded with the original input.
    pub fn new(workflow_id: String, instance_id: Uuid, input: Value) -> Self {
        let mut entries = IndexMap::new();
        entries.insert(INPUT_KEY.to_string(), input);
        Self {
            workflow_id,
            instance_id,
            entries,
        }
    }

    /// Rebuild a context from a persisted snapshot.
    pub fn from_snapshot(
        workflow_id: String,
        instance_id: Uuid,
        snapshot: &ContextSnapshot,
    ) -> Self {
        let entries = snapshot
            .iter()
            .map(|e| (e.step_id.clone(), e.output.clone()))
            .collect();
        Self {
            workflow_id,
            instance_id,
            entries,
        }
    }

    /// Id of the definition this instance was created from.
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Id of the running instance.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Commit a step output. Rejects duplicate step ids.
    pub fn insert(&mut self, step_id: &str, output: Value) -> Result<(), ContextError> {
        if self.entries.contains_key(step_id) {
            return Err(ContextError::DuplicateStep(step_id.to_string()));
        }
        self.entries.insert(step_id.to_string(), output);
        Ok(())
    }

    /// Read a committed output by step id (any earlier step, not just the
    /// immediately preceding one).
    pub fn get(&self, step_id: &str) -> Option<&Value> {
        self.entries.get(step_id)
    }

    /// The original workflow input.
    pub fn input(&self) -> &Value {
        // The input entry is written in `new` and never removed.
        self.entries
            .get(INPUT_KEY)
            .unwrap_or(&Value::Null)
    }

    /// Iterate entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries, including the reserved input entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the context holds only the input entry.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Produce an ordered snapshot for persistence.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot(
            self.entries
                .iter()
                .map(|(step_id, output)| ContextEntry {
                    step_id: step_id.clone(),
                    output: output.clone(),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_context() -> ExecutionContext {
        ExecutionContext::new(
            "metadata-enrich".to_string(),
            Uuid::now_v7(),
            json!({"text": "Bom dia", "title": "", "excerpt": ""}),
        )
    }

    #[test]
    fn test_input_seeded_and_readable() {
        let ctx = test_context();
        assert_eq!(ctx.input()["text"], json!("Bom dia"));
        assert_eq!(ctx.get(INPUT_KEY), Some(ctx.input()));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_insert_and_get() {
        let mut ctx = test_context();
        ctx.insert("detect-language", json!({"language_code": "pt"}))
            .unwrap();

        assert_eq!(
            ctx.get("detect-language"),
            Some(&json!({"language_code": "pt"}))
        );
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut ctx = test_context();
        ctx.insert("persist", json!(1)).unwrap();
        let err = ctx.insert("persist", json!(2)).unwrap_err();
        assert!(matches!(err, ContextError::DuplicateStep(id) if id == "persist"));
        // First write untouched
        assert_eq!(ctx.get("persist"), Some(&json!(1)));
    }

    #[test]
    fn test_reserved_input_key_rejected() {
        let mut ctx = test_context();
        let err = ctx.insert(INPUT_KEY, json!("overwrite")).unwrap_err();
        assert!(matches!(err, ContextError::DuplicateStep(_)));
    }

    #[test]
    fn test_entries_in_insertion_order() {
        let mut ctx = test_context();
        ctx.insert("b-step", json!(1)).unwrap();
        ctx.insert("a-step", json!(2)).unwrap();
        ctx.insert("c-step", json!(3)).unwrap();

        let ids: Vec<&str> = ctx.entries().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![INPUT_KEY, "b-step", "a-step", "c-step"]);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut ctx = test_context();
        ctx.insert("detect-language", json!({"language_code": "pt"}))
            .unwrap();
        ctx.insert("generate-if-missing", json!({"title": "Bom dia"}))
            .unwrap();

        let snapshot = ctx.snapshot();
        let restored = ExecutionContext::from_snapshot(
            ctx.workflow_id().to_string(),
            ctx.instance_id(),
            &snapshot,
        );

        assert_eq!(restored.len(), 3);
        let ids: Vec<&str> = restored.entries().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![INPUT_KEY, "detect-language", "generate-if-missing"]);
        assert_eq!(restored.input(), ctx.input());
    }
}
