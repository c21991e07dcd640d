//! Fire-and-forget fan-out over a collection of work items.
//!
//! `FanOutCoordinator` launches one child instance per item through the
//! engine, without awaiting any child's completion. Items are processed
//! sequentially to bound outstanding work and keep spawn records in
//! deterministic item order. The coordinator is always passed explicitly
//! into any step that needs to spawn children -- it is never reached through
//! ambient or global state.

use pressline_types::workflow::{FanOutSummary, SpawnRecord, SpawnStatus};
use serde_json::Value;
use uuid::Uuid;

use crate::engine::WorkflowEngine;
use crate::repository::InstanceRepository;

/// Input for one child launch, produced by the caller's builder closure.
#[derive(Debug, Clone)]
pub struct ChildSpawnInput {
    /// Identifier of the work item, echoed into the spawn record.
    pub item_key: String,
    /// The child workflow's input.
    pub input: Value,
}

/// Launches child instances for a batch of work items.
pub struct FanOutCoordinator<R: InstanceRepository> {
    engine: WorkflowEngine<R>,
}

impl<R: InstanceRepository> Clone for FanOutCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<R: InstanceRepository + 'static> FanOutCoordinator<R> {
    pub fn new(engine: WorkflowEngine<R>) -> Self {
        Self { engine }
    }

    /// Launch one child per item and return once every launch attempt has
    /// been issued.
    ///
    /// A failed submission (invalid child input, unknown definition,
    /// repository failure at create time) is recorded for that item and the
    /// loop continues -- a single child failing to launch never aborts the
    /// batch. The returned summary reflects launch outcomes only; callers
    /// needing completion must poll `engine.status` per child id.
    pub async fn spawn_all<T, F>(
        &self,
        child_definition_id: &str,
        parent_instance_id: Uuid,
        items: &[T],
        build_child_input: F,
    ) -> FanOutSummary
    where
        F: Fn(&T, usize) -> ChildSpawnInput,
    {
        let mut records = Vec::with_capacity(items.len());

        for (item_index, item) in items.iter().enumerate() {
            let child = build_child_input(item, item_index);

            match self
                .engine
                .submit_spawned(child_definition_id, child.input, Some(parent_instance_id))
                .await
            {
                Ok(child_instance_id) => {
                    tracing::debug!(
                        parent = %parent_instance_id,
                        child = %child_instance_id,
                        item_key = child.item_key.as_str(),
                        item_index,
                        "child instance started"
                    );
                    records.push(SpawnRecord {
                        item_index,
                        item_key: child.item_key,
                        child_instance_id: Some(child_instance_id),
                        status: SpawnStatus::Started,
                        error: None,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        parent = %parent_instance_id,
                        item_key = child.item_key.as_str(),
                        item_index,
                        error = %err,
                        "child launch failed"
                    );
                    records.push(SpawnRecord {
                        item_index,
                        item_key: child.item_key,
                        child_instance_id: None,
                        status: SpawnStatus::Failed,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let summary = FanOutSummary::from_records(items.len(), records);
        tracing::info!(
            parent = %parent_instance_id,
            child_definition = child_definition_id,
            total = summary.total_items,
            started = summary.succeeded_spawns,
            failed = summary.failed_spawns,
            "fan-out batch issued"
        );
        summary
    }
}
