//! Workflow engine: sequential per-instance execution with status tracking.
//!
//! One tokio task drives one instance; steps within an instance are strictly
//! sequential, instances run concurrently. Each step feeds its output forward
//! as the pipeline value while also committing it to the execution context
//! under its step id, so later steps can read any earlier output -- not just
//! the immediately preceding one.
//!
//! After every committed step the engine persists a full instance snapshot
//! (context included) to the repository, which is what `status` observers
//! read; the live context is never shared.

use std::sync::Arc;

use dashmap::DashMap;
use pressline_types::error::RepositoryError;
use pressline_types::workflow::{
    InstanceFilter, InstancePage, InstanceStatus, WorkflowInstance,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::catalog::{CatalogError, WorkflowCatalog, WorkflowDefinition};
use crate::context::ExecutionContext;
use crate::repository::InstanceRepository;
use crate::step::StepRunner;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors from engine operations.
///
/// A step handler failing is deliberately *not* an engine error: the run is
/// finalized as a `Failed` instance and returned as data, so no exception
/// ever crosses the status interface.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Definition lookup or registration failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Submitted input does not satisfy the definition's input contract.
    #[error("validation error: input is missing required fields [{}]", .0.join(", "))]
    Validation(Vec<String>),

    /// Repository failure.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// No instance with this id.
    #[error("workflow instance not found: {0}")]
    InstanceNotFound(Uuid),
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Drives workflow instances against a registered catalog.
///
/// Generic over `R: InstanceRepository` for storage flexibility. Cloning is
/// cheap (shared internals) -- the clone handed to a spawned driver task
/// observes the same registry and cancellation table.
pub struct WorkflowEngine<R: InstanceRepository> {
    repo: Arc<R>,
    catalog: Arc<WorkflowCatalog>,
    runner: StepRunner,
    /// Cancellation tokens for in-flight instances, keyed by instance id.
    cancel_tokens: Arc<DashMap<Uuid, CancellationToken>>,
}

impl<R: InstanceRepository> Clone for WorkflowEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            catalog: Arc::clone(&self.catalog),
            runner: self.runner,
            cancel_tokens: Arc::clone(&self.cancel_tokens),
        }
    }
}

impl<R: InstanceRepository + 'static> WorkflowEngine<R> {
    pub fn new(repo: Arc<R>, catalog: Arc<WorkflowCatalog>) -> Self {
        Self {
            repo,
            catalog,
            runner: StepRunner,
            cancel_tokens: Arc::new(DashMap::new()),
        }
    }

    /// The definition catalog this engine resolves submissions against.
    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Submit an input for execution and return immediately.
    ///
    /// Creates a `Pending` instance, then drives it on a spawned task; the
    /// returned id can be polled via [`status`](Self::status). Fails fast
    /// with [`EngineError::Validation`] before any step runs if the input
    /// does not satisfy the definition's contract.
    pub async fn submit(&self, definition_id: &str, input: Value) -> Result<Uuid, EngineError> {
        self.submit_spawned(definition_id, input, None).await
    }

    /// Submit a child instance on behalf of a parent (fan-out launch path).
    ///
    /// Identical to [`submit`](Self::submit) except the child carries a
    /// best-effort `spawned_by` annotation for observability.
    pub async fn submit_spawned(
        &self,
        definition_id: &str,
        input: Value,
        spawned_by: Option<Uuid>,
    ) -> Result<Uuid, EngineError> {
        let (definition, instance, token) =
            self.prepare(definition_id, input, spawned_by).await?;
        let instance_id = instance.id;

        let engine = self.clone();
        tokio::spawn(async move {
            engine.drive(definition, instance, token).await;
        });

        Ok(instance_id)
    }

    /// Submit an input and await the terminal snapshot.
    ///
    /// Used by callers that want completion directly; a failed step still
    /// returns `Ok` with a `Failed` instance.
    pub async fn run(
        &self,
        definition_id: &str,
        input: Value,
    ) -> Result<WorkflowInstance, EngineError> {
        let (definition, instance, token) = self.prepare(definition_id, input, None).await?;
        Ok(self.drive(definition, instance, token).await)
    }

    /// Validate, create the `Pending` registry entry, and register a
    /// cancellation token. Shared by the fire-and-forget and awaited paths.
    async fn prepare(
        &self,
        definition_id: &str,
        input: Value,
        spawned_by: Option<Uuid>,
    ) -> Result<(Arc<WorkflowDefinition>, WorkflowInstance, CancellationToken), EngineError> {
        let definition = self.catalog.get(definition_id)?;

        let missing = definition.input_contract.missing_fields(&input);
        if !missing.is_empty() {
            return Err(EngineError::Validation(missing));
        }

        let instance = WorkflowInstance::new(definition.id.clone(), input, spawned_by);
        self.repo.create(&instance).await?;

        let token = CancellationToken::new();
        self.cancel_tokens.insert(instance.id, token.clone());

        tracing::info!(
            instance_id = %instance.id,
            workflow = definition.id.as_str(),
            spawned_by = ?spawned_by,
            "workflow instance submitted"
        );

        Ok((definition, instance, token))
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Drive an instance to a terminal state, persisting a snapshot after
    /// every step. Never returns an error: step failures finalize the
    /// instance as `Failed` and are surfaced through its snapshot.
    async fn drive(
        &self,
        definition: Arc<WorkflowDefinition>,
        mut instance: WorkflowInstance,
        token: CancellationToken,
    ) -> WorkflowInstance {
        let mut ctx = ExecutionContext::from_snapshot(
            definition.id.clone(),
            instance.id,
            &instance.context,
        );

        instance.status = InstanceStatus::Running;
        if let Err(err) = self.persist(&mut instance).await {
            tracing::error!(instance_id = %instance.id, error = %err, "failed to mark instance running");
        }

        let mut pipeline = ctx.input().clone();
        let mut outcome = StepOutcome::Completed;

        for step in &definition.steps {
            // Cancellation is observed only between steps; a running handler
            // is never pre-empted.
            if token.is_cancelled() {
                outcome = StepOutcome::Canceled;
                break;
            }

            match self.runner.run(step, pipeline.clone(), &mut ctx, &token).await {
                Ok(output) => {
                    pipeline = output;
                    instance.context = ctx.snapshot();
                    if let Err(err) = self.persist(&mut instance).await {
                        tracing::error!(
                            instance_id = %instance.id,
                            step_id = step.id.as_str(),
                            error = %err,
                            "failed to persist step snapshot"
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        instance_id = %instance.id,
                        step_id = step.id.as_str(),
                        error = %err,
                        "step failed, aborting instance"
                    );
                    outcome = StepOutcome::Failed {
                        step_id: step.id.clone(),
                        error: err.to_string(),
                    };
                    break;
                }
            }
        }

        match outcome {
            StepOutcome::Completed => {
                instance.status = InstanceStatus::Succeeded;
                instance.output = Some(pipeline);
            }
            StepOutcome::Failed { step_id, error } => {
                instance.status = InstanceStatus::Failed;
                instance.error = Some(format!("step '{step_id}' failed: {error}"));
            }
            StepOutcome::Canceled => {
                instance.status = InstanceStatus::Canceled;
                instance.error = Some("canceled between steps".to_string());
            }
        }
        instance.context = ctx.snapshot();
        instance.finished_at = Some(chrono::Utc::now());

        if let Err(err) = self.persist(&mut instance).await {
            tracing::error!(instance_id = %instance.id, error = %err, "failed to finalize instance");
        }

        self.cancel_tokens.remove(&instance.id);

        tracing::info!(
            instance_id = %instance.id,
            workflow = definition.id.as_str(),
            status = ?instance.status,
            "workflow instance finished"
        );

        instance
    }

    /// Write a full snapshot under the next version.
    ///
    /// The bump is rolled back on a failed write so the next attempt still
    /// carries `stored.version + 1`; otherwise one transient failure would
    /// wedge every later write (the terminal one included) on the CAS.
    async fn persist(&self, instance: &mut WorkflowInstance) -> Result<(), RepositoryError> {
        instance.version += 1;
        match self.repo.update(instance).await {
            Ok(()) => Ok(()),
            Err(err) => {
                instance.version -= 1;
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Fetch a well-formed snapshot of an instance. Idempotent once the
    /// instance is terminal.
    pub async fn status(&self, instance_id: Uuid) -> Result<WorkflowInstance, EngineError> {
        self.repo
            .get(&instance_id)
            .await?
            .ok_or(EngineError::InstanceNotFound(instance_id))
    }

    /// List instances newest first.
    pub async fn list(&self, filter: &InstanceFilter) -> Result<InstancePage, EngineError> {
        Ok(self.repo.list(filter).await?)
    }

    /// Request cancellation of an in-flight instance.
    ///
    /// The driver observes the token between steps and finalizes the
    /// instance as `Canceled`; handlers may additionally observe it at their
    /// own await points. Returns `InstanceNotFound` if the instance is not
    /// currently in flight.
    pub fn cancel(&self, instance_id: Uuid) -> Result<(), EngineError> {
        match self.cancel_tokens.get(&instance_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(instance_id = %instance_id, "cancellation requested");
                Ok(())
            }
            None => Err(EngineError::InstanceNotFound(instance_id)),
        }
    }
}

/// Terminal disposition of the step loop.
enum StepOutcome {
    Completed,
    Failed { step_id: String, error: String },
    Canceled,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
