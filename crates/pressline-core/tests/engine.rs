//! End-to-end engine behavior over the in-memory repository.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Notify;
use uuid::Uuid;

use pressline_core::catalog::{InputContract, WorkflowCatalog, WorkflowDefinition};
use pressline_core::repository::InstanceRepository;
use pressline_core::step::{StepDefinition, StepError, handler_fn};
use pressline_core::{EngineError, WorkflowEngine};
use pressline_infra::memory::MemoryInstanceRepository;
use pressline_types::error::RepositoryError;
use pressline_types::workflow::{
    InstanceFilter, InstancePage, InstanceStatus, WorkflowInstance,
};

fn engine_with(
    definitions: Vec<WorkflowDefinition>,
) -> WorkflowEngine<MemoryInstanceRepository> {
    let catalog = Arc::new(WorkflowCatalog::new());
    for def in definitions {
        catalog.register(def).unwrap();
    }
    WorkflowEngine::new(Arc::new(MemoryInstanceRepository::new()), catalog)
}

/// A step that records how often it ran and emits `{"step": <id>}`.
fn counted_step(id: &str, counter: Arc<AtomicUsize>) -> StepDefinition {
    let step_id = id.to_string();
    StepDefinition::new(
        id,
        id,
        handler_fn(move |_input, _ctx, _cancel| {
            let counter = Arc::clone(&counter);
            let step_id = step_id.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "step": step_id }))
            }
        }),
    )
}

fn failing_step(id: &str) -> StepDefinition {
    StepDefinition::new(
        id,
        id,
        handler_fn(|_input, _ctx, _cancel| async {
            Err(StepError::ExecutionFailed("boom".to_string()))
        }),
    )
}

#[tokio::test]
async fn run_commits_every_step_and_succeeds() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = engine_with(vec![WorkflowDefinition {
        id: "three-steps".to_string(),
        name: "Three steps".to_string(),
        steps: vec![
            counted_step("s1", Arc::clone(&calls)),
            counted_step("s2", Arc::clone(&calls)),
            counted_step("s3", Arc::clone(&calls)),
        ],
        input_contract: InputContract::default(),
    }]);

    let instance = engine.run("three-steps", json!({"n": 1})).await.unwrap();

    assert_eq!(instance.status, InstanceStatus::Succeeded);
    assert_eq!(instance.output, Some(json!({"step": "s3"})));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(instance.finished_at.is_some());

    // Context holds input plus one entry per step, in execution order.
    let keys: Vec<&str> = instance.context.iter().map(|e| e.step_id.as_str()).collect();
    assert_eq!(keys, vec!["input", "s1", "s2", "s3"]);
}

#[tokio::test]
async fn failed_step_aborts_without_running_later_steps() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = engine_with(vec![WorkflowDefinition {
        id: "fails-midway".to_string(),
        name: "Fails midway".to_string(),
        steps: vec![
            counted_step("s1", Arc::clone(&calls)),
            failing_step("s2"),
            counted_step("s3", Arc::clone(&calls)),
        ],
        input_contract: InputContract::default(),
    }]);

    let instance = engine.run("fails-midway", json!({})).await.unwrap();

    assert_eq!(instance.status, InstanceStatus::Failed);
    let error = instance.error.as_deref().unwrap();
    assert!(error.contains("s2"), "error should name the step: {error}");
    assert!(instance.output.is_none());

    // s3 never ran; only the committed prefix is in the context.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let keys: Vec<&str> = instance.context.iter().map(|e| e.step_id.as_str()).collect();
    assert_eq!(keys, vec!["input", "s1"]);
}

#[tokio::test]
async fn steps_read_non_adjacent_checkpoints() {
    let first = StepDefinition::new(
        "emit",
        "Emit value",
        handler_fn(|_input, _ctx, _cancel| async { Ok(json!({"flag": 7})) }),
    );
    let second = StepDefinition::new(
        "shuffle",
        "Unrelated output",
        handler_fn(|_input, _ctx, _cancel| async { Ok(json!({"other": true})) }),
    );
    // Reads both the original input and the first step's checkpoint,
    // neither of which is its direct predecessor's output.
    let third = StepDefinition::new(
        "combine",
        "Combine checkpoints",
        handler_fn(|_input, ctx, _cancel| async move {
            let flag = ctx.get("emit").and_then(|v| v["flag"].as_u64());
            let seed = ctx.input()["seed"].as_u64();
            Ok(json!({ "flag": flag, "seed": seed }))
        }),
    );

    let engine = engine_with(vec![WorkflowDefinition {
        id: "dual-addressing".to_string(),
        name: "Dual addressing".to_string(),
        steps: vec![first, second, third],
        input_contract: InputContract::default(),
    }]);

    let instance = engine
        .run("dual-addressing", json!({"seed": 42}))
        .await
        .unwrap();

    assert_eq!(instance.status, InstanceStatus::Succeeded);
    assert_eq!(instance.output, Some(json!({"flag": 7, "seed": 42})));
}

#[tokio::test]
async fn submit_validates_contract_before_creating_anything() {
    let engine = engine_with(vec![WorkflowDefinition {
        id: "strict".to_string(),
        name: "Strict contract".to_string(),
        steps: vec![counted_step("s1", Arc::new(AtomicUsize::new(0)))],
        input_contract: InputContract::required(&["post_id", "text"]),
    }]);

    let err = engine.submit("strict", json!({"text": "x"})).await.unwrap_err();
    match err {
        EngineError::Validation(missing) => assert_eq!(missing, vec!["post_id".to_string()]),
        other => panic!("expected validation error, got {other:?}"),
    }

    // Nothing was persisted for the rejected submission.
    let page = engine.list(&InstanceFilter::all(10)).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn submit_unknown_definition_fails() {
    let engine = engine_with(vec![]);
    let err = engine.submit("nope", json!({})).await.unwrap_err();
    assert!(matches!(err, EngineError::Catalog(_)));
}

#[tokio::test]
async fn status_unknown_instance_fails() {
    let engine = engine_with(vec![]);
    let err = engine.status(Uuid::now_v7()).await.unwrap_err();
    assert!(matches!(err, EngineError::InstanceNotFound(_)));
}

#[tokio::test]
async fn status_is_stable_once_terminal() {
    let engine = engine_with(vec![WorkflowDefinition {
        id: "one-step".to_string(),
        name: "One step".to_string(),
        steps: vec![counted_step("s1", Arc::new(AtomicUsize::new(0)))],
        input_contract: InputContract::default(),
    }]);

    let instance = engine.run("one-step", json!({})).await.unwrap();
    let first = engine.status(instance.id).await.unwrap();
    let second = engine.status(instance.id).await.unwrap();

    assert_eq!(first.status, InstanceStatus::Succeeded);
    assert_eq!(first.version, second.version);
    assert_eq!(first.finished_at, second.finished_at);
}

#[tokio::test]
async fn cancel_between_steps_stops_the_instance() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let gated = {
        let entered = Arc::clone(&entered);
        let release = Arc::clone(&release);
        StepDefinition::new(
            "gated",
            "Waits for the test",
            handler_fn(move |_input, _ctx, _cancel| {
                let entered = Arc::clone(&entered);
                let release = Arc::clone(&release);
                async move {
                    entered.notify_one();
                    release.notified().await;
                    Ok(json!({"done": true}))
                }
            }),
        )
    };
    let never = StepDefinition::new(
        "never",
        "Must not run",
        handler_fn(|_input, _ctx, _cancel| async {
            panic!("step ran after cancellation")
        }),
    );

    let engine = engine_with(vec![WorkflowDefinition {
        id: "cancelable".to_string(),
        name: "Cancelable".to_string(),
        steps: vec![gated, never],
        input_contract: InputContract::default(),
    }]);

    let id = engine.submit("cancelable", json!({})).await.unwrap();
    entered.notified().await;

    // Cancel while the first step is still in flight; it runs to completion
    // and the instance stops before the second step.
    engine.cancel(id).unwrap();
    release.notify_one();

    let instance = loop {
        let snapshot = engine.status(id).await.unwrap();
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    assert_eq!(instance.status, InstanceStatus::Canceled);
    let keys: Vec<&str> = instance.context.iter().map(|e| e.step_id.as_str()).collect();
    assert_eq!(keys, vec!["input", "gated"]);
}

/// Delegates to the in-memory repository but drops the first `update`.
struct FlakyRepository {
    inner: MemoryInstanceRepository,
    failures_left: AtomicUsize,
}

impl FlakyRepository {
    fn failing_once() -> Self {
        Self {
            inner: MemoryInstanceRepository::new(),
            failures_left: AtomicUsize::new(1),
        }
    }
}

impl InstanceRepository for FlakyRepository {
    async fn create(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError> {
        self.inner.create(instance).await
    }

    async fn update(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RepositoryError::Connection);
        }
        self.inner.update(instance).await
    }

    async fn get(&self, id: &Uuid) -> Result<Option<WorkflowInstance>, RepositoryError> {
        self.inner.get(id).await
    }

    async fn list(&self, filter: &InstanceFilter) -> Result<InstancePage, RepositoryError> {
        self.inner.list(filter).await
    }
}

#[tokio::test]
async fn transient_persist_failure_does_not_wedge_the_registry() {
    let catalog = Arc::new(WorkflowCatalog::new());
    catalog
        .register(WorkflowDefinition {
            id: "flaky-store".to_string(),
            name: "Flaky store".to_string(),
            steps: vec![
                counted_step("s1", Arc::new(AtomicUsize::new(0))),
                counted_step("s2", Arc::new(AtomicUsize::new(0))),
            ],
            input_contract: InputContract::default(),
        })
        .unwrap();
    let engine = WorkflowEngine::new(Arc::new(FlakyRepository::failing_once()), catalog);

    // The dropped write is the Pending -> Running one; every later snapshot
    // must still land, the terminal one included.
    let instance = engine.run("flaky-store", json!({})).await.unwrap();
    assert_eq!(instance.status, InstanceStatus::Succeeded);

    let stored = engine.status(instance.id).await.unwrap();
    assert_eq!(stored.status, InstanceStatus::Succeeded);
    assert_eq!(stored.version, instance.version);
    assert!(stored.finished_at.is_some());
}

#[tokio::test]
async fn list_filters_by_definition_and_orders_newest_first() {
    let engine = engine_with(vec![
        WorkflowDefinition {
            id: "alpha".to_string(),
            name: "Alpha".to_string(),
            steps: vec![counted_step("s1", Arc::new(AtomicUsize::new(0)))],
            input_contract: InputContract::default(),
        },
        WorkflowDefinition {
            id: "beta".to_string(),
            name: "Beta".to_string(),
            steps: vec![counted_step("s1", Arc::new(AtomicUsize::new(0)))],
            input_contract: InputContract::default(),
        },
    ]);

    let mut alpha_ids = Vec::new();
    for _ in 0..3 {
        alpha_ids.push(engine.run("alpha", json!({})).await.unwrap().id);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    engine.run("beta", json!({})).await.unwrap();

    let page = engine
        .list(&InstanceFilter {
            definition_id: Some("alpha".to_string()),
            page: 1,
            per_page: 2,
        })
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.instances.len(), 2);
    assert_eq!(page.instances[0].id, alpha_ids[2]);
    assert_eq!(page.instances[1].id, alpha_ids[1]);
    assert!(page.instances.iter().all(|i| i.definition_id == "alpha"));
}
