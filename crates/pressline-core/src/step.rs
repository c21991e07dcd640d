//! Step definitions, the handler trait, and the step runner.
//!
//! A step handler is an async, fallible function from `(input, context)` to
//! an output value. Handlers are stored as trait objects inside
//! `StepDefinition`, so the trait returns a boxed future instead of using
//! return-position `impl Trait` (which is not dyn-compatible).

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::context::{ContextError, ExecutionContext};

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors a step handler can surface.
///
/// Any of these aborts the instance; the engine performs no retries and no
/// classification beyond recording the message.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Step execution failed.
    #[error("step execution failed: {0}")]
    ExecutionFailed(String),

    /// The pipeline value did not have the shape this step expects.
    #[error("invalid step payload: {0}")]
    InvalidPayload(String),

    /// The handler observed cancellation at one of its await points.
    #[error("step canceled")]
    Canceled,
}

impl StepError {
    /// Wrap a collaborator or IO error as an execution failure.
    pub fn failed(err: impl fmt::Display) -> Self {
        StepError::ExecutionFailed(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// StepHandler
// ---------------------------------------------------------------------------

/// Async handler for one workflow step.
///
/// Receives the current pipeline value, a read-only copy of the execution
/// context (for named-checkpoint reads of any earlier output), and the
/// instance's cancellation token, which the handler may observe at its own
/// blocking points. The engine never pre-empts a running handler.
pub trait StepHandler: Send + Sync {
    fn run(
        &self,
        input: Value,
        ctx: ExecutionContext,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Value, StepError>>;
}

struct FnHandler<F>(F);

impl<F, Fut> StepHandler for FnHandler<F>
where
    F: Fn(Value, ExecutionContext, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
{
    fn run(
        &self,
        input: Value,
        ctx: ExecutionContext,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Value, StepError>> {
        Box::pin((self.0)(input, ctx, cancel))
    }
}

/// Wrap an async closure as a shareable step handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn StepHandler>
where
    F: Fn(Value, ExecutionContext, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

// ---------------------------------------------------------------------------
// StepDefinition
// ---------------------------------------------------------------------------

/// One named unit of work in a workflow definition.
#[derive(Clone)]
pub struct StepDefinition {
    /// Unique within a definition; also the context key for the output.
    pub id: String,
    /// Human-readable label; not semantically used.
    pub name: String,
    /// The step's handler.
    pub handler: Arc<dyn StepHandler>,
}

impl StepDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        handler: Arc<dyn StepHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            handler,
        }
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

/// Errors from running one step through the runner.
#[derive(Debug, thiserror::Error)]
pub enum StepRunError {
    #[error(transparent)]
    Handler(#[from] StepError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Executes one step's handler and commits its output to the context.
///
/// Exactly one context write per successful execution, none on failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepRunner;

impl StepRunner {
    /// Run `step` against the current pipeline value.
    ///
    /// On success the output is written into `ctx` under `step.id` and
    /// returned as the next pipeline value. Handler errors are returned
    /// verbatim; there are no retries.
    pub async fn run(
        &self,
        step: &StepDefinition,
        input: Value,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Value, StepRunError> {
        tracing::debug!(
            instance_id = %ctx.instance_id(),
            step_id = step.id.as_str(),
            "running step"
        );

        let output = step
            .handler
            .run(input, ctx.clone(), cancel.clone())
            .await?;

        ctx.insert(&step.id, output.clone())?;
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn test_ctx() -> ExecutionContext {
        ExecutionContext::new("t".to_string(), Uuid::now_v7(), json!({"n": 1}))
    }

    #[tokio::test]
    async fn test_success_writes_exactly_one_entry() {
        let step = StepDefinition::new(
            "double",
            "Double",
            handler_fn(|input, _ctx, _cancel| async move {
                let n = input["n"].as_i64().unwrap_or(0);
                Ok(json!({"n": n * 2}))
            }),
        );

        let mut ctx = test_ctx();
        let before = ctx.len();
        let out = StepRunner
            .run(&step, ctx.input().clone(), &mut ctx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out, json!({"n": 2}));
        assert_eq!(ctx.len(), before + 1);
        assert_eq!(ctx.get("double"), Some(&json!({"n": 2})));
    }

    #[tokio::test]
    async fn test_failure_writes_nothing() {
        let step = StepDefinition::new(
            "boom",
            "Boom",
            handler_fn(|_input, _ctx, _cancel| async move {
                Err(StepError::ExecutionFailed("collaborator down".to_string()))
            }),
        );

        let mut ctx = test_ctx();
        let err = StepRunner
            .run(&step, json!(null), &mut ctx, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, StepRunError::Handler(StepError::ExecutionFailed(_))));
        assert_eq!(ctx.get("boom"), None);
        assert_eq!(ctx.len(), 1);
    }

    #[tokio::test]
    async fn test_handler_can_read_earlier_checkpoints() {
        let mut ctx = test_ctx();
        ctx.insert("first", json!({"value": 41})).unwrap();

        let step = StepDefinition::new(
            "second",
            "Second",
            handler_fn(|_input, ctx, _cancel| async move {
                let v = ctx
                    .get("first")
                    .and_then(|o| o["value"].as_i64())
                    .ok_or_else(|| StepError::InvalidPayload("missing 'first'".into()))?;
                Ok(json!({"value": v + 1}))
            }),
        );

        let out = StepRunner
            .run(&step, json!(null), &mut ctx, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, json!({"value": 42}));
    }
}
