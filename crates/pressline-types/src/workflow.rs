//! Workflow execution tracking types.
//!
//! A `WorkflowInstance` is one execution of a registered definition against a
//! specific input. Definitions themselves live in `pressline-core` because
//! they carry step handlers (closures); everything here is plain data that
//! can cross a storage or reporting boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Instance status
// ---------------------------------------------------------------------------

/// Lifecycle status of a workflow instance.
///
/// `Pending` at submission, `Running` once the first step begins, then one of
/// the terminal states. `Canceled` is only ever entered between steps (the
/// engine never pre-empts a running handler); no terminal state is ever left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl InstanceStatus {
    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Succeeded | InstanceStatus::Failed | InstanceStatus::Canceled
        )
    }
}

// ---------------------------------------------------------------------------
// Context snapshot
// ---------------------------------------------------------------------------

/// One step's committed output inside a context snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Step id the output was written under (or the reserved `input` key).
    pub step_id: String,
    /// The output value.
    pub output: Value,
}

/// Insertion-ordered snapshot of an instance's execution context.
///
/// Stored as an explicit entry list rather than a JSON object so the order
/// survives serialization regardless of map implementation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextSnapshot(pub Vec<ContextEntry>);

impl ContextSnapshot {
    /// Look up an entry by step id.
    pub fn get(&self, step_id: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|e| e.step_id == step_id)
            .map(|e| &e.output)
    }

    /// Number of entries (including the reserved `input` entry).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ContextEntry> {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Workflow instance
// ---------------------------------------------------------------------------

/// One execution of a workflow definition. Used for status queries and audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// UUIDv7 instance id.
    pub id: Uuid,
    /// Id of the definition this instance was created from.
    pub definition_id: String,
    /// Current lifecycle status.
    pub status: InstanceStatus,
    /// Error message, set only when the instance failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Ordered context snapshot (original input plus committed step outputs).
    pub context: ContextSnapshot,
    /// Final pipeline value, set only when the instance succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Parent instance that launched this one via fan-out, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawned_by: Option<Uuid>,
    /// When the instance was created.
    pub created_at: DateTime<Utc>,
    /// When the instance reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Monotonic update counter, used for compare-and-set repository writes.
    pub version: u64,
}

impl WorkflowInstance {
    /// Create a fresh `Pending` instance whose context holds only the input.
    pub fn new(definition_id: String, input: Value, spawned_by: Option<Uuid>) -> Self {
        Self {
            id: Uuid::now_v7(),
            definition_id,
            status: InstanceStatus::Pending,
            error: None,
            context: ContextSnapshot(vec![ContextEntry {
                step_id: "input".to_string(),
                output: input,
            }]),
            output: None,
            spawned_by,
            created_at: Utc::now(),
            finished_at: None,
            version: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Filter for paginated instance listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceFilter {
    /// Restrict to instances of one definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<String>,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
}

impl InstanceFilter {
    /// Filter for the first page of all definitions.
    pub fn all(per_page: u32) -> Self {
        Self {
            definition_id: None,
            page: 1,
            per_page,
        }
    }
}

/// One page of instances, newest first by `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstancePage {
    pub instances: Vec<WorkflowInstance>,
    pub page: u32,
    pub per_page: u32,
    /// Total instances matching the filter (across all pages).
    pub total: u64,
}

// ---------------------------------------------------------------------------
// Fan-out records
// ---------------------------------------------------------------------------

/// Outcome of one child launch attempt within a fan-out batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnStatus {
    /// The child instance was created and started.
    Started,
    /// The submission itself failed; no child instance exists.
    Failed,
}

/// Launch record for one work item of a fan-out batch.
///
/// Transient: produced once per item and folded into the batch summary,
/// never persisted as its own entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnRecord {
    /// Position of the item in the batch.
    pub item_index: usize,
    /// Caller-supplied identifier of the work item.
    pub item_key: String,
    /// Child instance id, set when the launch succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_instance_id: Option<Uuid>,
    pub status: SpawnStatus,
    /// Launch error, set when the submission failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of a fan-out batch.
///
/// Reflects *launch* outcomes only -- it says nothing about whether any
/// child has completed. Callers needing completion must poll each id in
/// `child_instance_ids` separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutSummary {
    /// Number of work items in the batch.
    pub total_items: usize,
    /// Launch attempts issued (always equals `total_items`).
    pub spawned: usize,
    /// Attempts that produced a running child.
    pub succeeded_spawns: usize,
    /// Attempts where the submission itself failed.
    pub failed_spawns: usize,
    /// Ids of the children that started, in item order.
    pub child_instance_ids: Vec<Uuid>,
    /// Per-item launch records, in item order.
    pub records: Vec<SpawnRecord>,
}

impl FanOutSummary {
    /// Fold per-item records into the batch aggregate.
    pub fn from_records(total_items: usize, records: Vec<SpawnRecord>) -> Self {
        let succeeded_spawns = records
            .iter()
            .filter(|r| r.status == SpawnStatus::Started)
            .count();
        let failed_spawns = records
            .iter()
            .filter(|r| r.status == SpawnStatus::Failed)
            .count();
        let child_instance_ids = records
            .iter()
            .filter_map(|r| r.child_instance_id)
            .collect();
        Self {
            total_items,
            spawned: records.len(),
            succeeded_spawns,
            failed_spawns,
            child_instance_ids,
            records,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instance_status_serde() {
        for status in [
            InstanceStatus::Pending,
            InstanceStatus::Running,
            InstanceStatus::Succeeded,
            InstanceStatus::Failed,
            InstanceStatus::Canceled,
        ] {
            let json_str = serde_json::to_string(&status).unwrap();
            let parsed: InstanceStatus = serde_json::from_str(&json_str).unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!(
            serde_json::to_string(&InstanceStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!InstanceStatus::Pending.is_terminal());
        assert!(!InstanceStatus::Running.is_terminal());
        assert!(InstanceStatus::Succeeded.is_terminal());
        assert!(InstanceStatus::Failed.is_terminal());
        assert!(InstanceStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_new_instance_seeds_input_entry() {
        let instance = WorkflowInstance::new(
            "content-audit".to_string(),
            json!({"page": 1}),
            None,
        );
        assert_eq!(instance.status, InstanceStatus::Pending);
        assert_eq!(instance.version, 0);
        assert_eq!(instance.context.len(), 1);
        assert_eq!(instance.context.get("input"), Some(&json!({"page": 1})));
    }

    #[test]
    fn test_context_snapshot_preserves_order_through_serde() {
        let snapshot = ContextSnapshot(vec![
            ContextEntry {
                step_id: "input".to_string(),
                output: json!({"text": "hi"}),
            },
            ContextEntry {
                step_id: "detect-language".to_string(),
                output: json!({"language_code": "en"}),
            },
            ContextEntry {
                step_id: "persist".to_string(),
                output: json!({"persisted": true}),
            },
        ]);

        let json_str = serde_json::to_string(&snapshot).unwrap();
        let restored: ContextSnapshot = serde_json::from_str(&json_str).unwrap();
        let ids: Vec<&str> = restored.iter().map(|e| e.step_id.as_str()).collect();
        assert_eq!(ids, vec!["input", "detect-language", "persist"]);
    }

    #[test]
    fn test_instance_json_roundtrip() {
        let instance = WorkflowInstance::new(
            "audit-post".to_string(),
            json!({"post_id": "x"}),
            Some(Uuid::now_v7()),
        );
        let json_str = serde_json::to_string(&instance).unwrap();
        let parsed: WorkflowInstance = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.id, instance.id);
        assert_eq!(parsed.definition_id, "audit-post");
        assert_eq!(parsed.spawned_by, instance.spawned_by);
    }

    #[test]
    fn test_summary_from_records() {
        let child = Uuid::now_v7();
        let records = vec![
            SpawnRecord {
                item_index: 0,
                item_key: "a".to_string(),
                child_instance_id: Some(child),
                status: SpawnStatus::Started,
                error: None,
            },
            SpawnRecord {
                item_index: 1,
                item_key: "b".to_string(),
                child_instance_id: None,
                status: SpawnStatus::Failed,
                error: Some("validation error".to_string()),
            },
        ];

        let summary = FanOutSummary::from_records(2, records);
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.spawned, 2);
        assert_eq!(summary.succeeded_spawns, 1);
        assert_eq!(summary.failed_spawns, 1);
        assert_eq!(summary.child_instance_ids, vec![child]);
    }
}
