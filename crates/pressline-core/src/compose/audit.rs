//! Bulk content consistency audit.
//!
//! Master workflow `content-audit` pages through the content store and fans
//! one `audit-post` child out per post, without awaiting any child. Each
//! child fetches its post, asks the judgment collaborator for a verdict,
//! emits a tagged decision, conditionally applies the correction, and
//! assembles a report.
//!
//! The `decide` step does not branch the pipeline structurally; it produces
//! a tagged `AuditAction` and `apply-correction` matches on the tag. A
//! failed correction write is caught inside `apply-correction` and reported
//! as data -- the audit's purpose is reporting, not guaranteeing mutation.

use std::sync::Arc;

use pressline_types::audit::{AuditAction, AuditReport, ConsistencyVerdict};
use pressline_types::content::Post;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::catalog::{CatalogError, InputContract, WorkflowCatalog, WorkflowDefinition};
use crate::collab::{ContentStore, JudgmentService};
use crate::fanout::{ChildSpawnInput, FanOutCoordinator};
use crate::repository::InstanceRepository;
use crate::step::{StepDefinition, StepError, handler_fn};

/// Catalog id of the master workflow.
pub const MASTER_DEFINITION_ID: &str = "content-audit";

/// Catalog id of the per-post child workflow.
pub const CHILD_DEFINITION_ID: &str = "audit-post";

/// Page size used when the master's input does not specify one.
const DEFAULT_COLLECT_PER_PAGE: u32 = 50;

/// Register both audit workflows into the catalog.
pub fn register<R, C, J>(
    catalog: &WorkflowCatalog,
    coordinator: FanOutCoordinator<R>,
    content: Arc<C>,
    judgment: Arc<J>,
) -> Result<(), CatalogError>
where
    R: InstanceRepository + 'static,
    C: ContentStore + 'static,
    J: JudgmentService + 'static,
{
    catalog.register(child_definition(Arc::clone(&content), judgment))?;
    catalog.register(master_definition(coordinator, content))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Master workflow
// ---------------------------------------------------------------------------

/// Build the master definition: collect every post id, then fan out.
pub fn master_definition<R, C>(
    coordinator: FanOutCoordinator<R>,
    content: Arc<C>,
) -> WorkflowDefinition
where
    R: InstanceRepository + 'static,
    C: ContentStore + 'static,
{
    let collect = {
        let content = Arc::clone(&content);
        StepDefinition::new(
            "collect-posts",
            "Collect posts",
            handler_fn(move |input, _ctx, cancel| {
                let content = Arc::clone(&content);
                async move {
                    let per_page = input["per_page"]
                        .as_u64()
                        .map(|n| n as u32)
                        .unwrap_or(DEFAULT_COLLECT_PER_PAGE);
                    if per_page == 0 {
                        return Err(StepError::InvalidPayload(
                            "per_page must be positive".to_string(),
                        ));
                    }

                    let mut post_ids: Vec<String> = Vec::new();
                    let mut page = 1u32;
                    loop {
                        if cancel.is_cancelled() {
                            return Err(StepError::Canceled);
                        }
                        let batch = content
                            .list_posts(page, per_page)
                            .await
                            .map_err(StepError::failed)?;
                        let fetched = batch.posts.len();
                        post_ids.extend(batch.posts.iter().map(|p| p.id.to_string()));
                        // A short or empty page means the store is exhausted.
                        if fetched < per_page as usize {
                            break;
                        }
                        page += 1;
                    }

                    Ok(json!({
                        "post_ids": post_ids,
                        "total_posts": post_ids.len(),
                    }))
                }
            }),
        )
    };

    let fan_out = StepDefinition::new(
        "fan-out",
        "Fan out per-post audits",
        handler_fn(move |input, ctx, _cancel| {
            let coordinator = coordinator.clone();
            async move {
                let post_ids: Vec<String> = serde_json::from_value(input["post_ids"].clone())
                    .map_err(|e| {
                        StepError::InvalidPayload(format!("expected post_ids array: {e}"))
                    })?;

                let summary = coordinator
                    .spawn_all(
                        CHILD_DEFINITION_ID,
                        ctx.instance_id(),
                        &post_ids,
                        |post_id, _index| ChildSpawnInput {
                            item_key: post_id.clone(),
                            input: json!({ "post_id": post_id }),
                        },
                    )
                    .await;

                serde_json::to_value(&summary)
                    .map_err(|e| StepError::ExecutionFailed(e.to_string()))
            }
        }),
    );

    WorkflowDefinition {
        id: MASTER_DEFINITION_ID.to_string(),
        name: "Content consistency audit".to_string(),
        steps: vec![collect, fan_out],
        input_contract: InputContract::default(),
    }
}

// ---------------------------------------------------------------------------
// Child workflow
// ---------------------------------------------------------------------------

/// Build the per-post child definition:
/// fetch -> judge -> decide -> apply -> report.
pub fn child_definition<C, J>(content: Arc<C>, judgment: Arc<J>) -> WorkflowDefinition
where
    C: ContentStore + 'static,
    J: JudgmentService + 'static,
{
    let fetch = {
        let content = Arc::clone(&content);
        StepDefinition::new(
            "fetch-post",
            "Fetch post",
            handler_fn(move |input, _ctx, _cancel| {
                let content = Arc::clone(&content);
                async move {
                    let post_id = parse_post_id(&input)?;
                    let post = content
                        .get_post(&post_id)
                        .await
                        .map_err(StepError::failed)?
                        .ok_or_else(|| {
                            StepError::ExecutionFailed(format!("post {post_id} not found"))
                        })?;
                    serde_json::to_value(&post)
                        .map_err(|e| StepError::ExecutionFailed(e.to_string()))
                }
            }),
        )
    };

    let judge = StepDefinition::new(
        "judge-consistency",
        "Judge metadata consistency",
        handler_fn(move |input, _ctx, _cancel| {
            let judgment = Arc::clone(&judgment);
            async move {
                let post: Post = serde_json::from_value(input)
                    .map_err(|e| StepError::InvalidPayload(format!("expected post: {e}")))?;
                let verdict = judgment.assess(&post).await.map_err(StepError::failed)?;
                serde_json::to_value(&verdict)
                    .map_err(|e| StepError::ExecutionFailed(e.to_string()))
            }
        }),
    );

    let decide = StepDefinition::new(
        "decide",
        "Decide correction",
        handler_fn(|input, ctx, _cancel| async move {
            let verdict: ConsistencyVerdict = serde_json::from_value(input)
                .map_err(|e| StepError::InvalidPayload(format!("expected verdict: {e}")))?;

            // The verdict no longer carries the post; read the fetch step's
            // checkpoint for the language instead of re-threading it.
            let language_code = ctx
                .get("fetch-post")
                .and_then(|p| p["language_code"].as_str())
                .ok_or_else(|| {
                    StepError::InvalidPayload("missing fetch-post checkpoint".to_string())
                })?
                .to_string();

            let action = match verdict {
                ConsistencyVerdict::Consistent => AuditAction::Skip {
                    reason: "metadata consistent with body".to_string(),
                },
                ConsistencyVerdict::Inconsistent { title, excerpt } => AuditAction::Apply {
                    title,
                    excerpt,
                    language_code,
                },
            };

            serde_json::to_value(&action).map_err(|e| StepError::ExecutionFailed(e.to_string()))
        }),
    );

    let apply = {
        let content = Arc::clone(&content);
        StepDefinition::new(
            "apply-correction",
            "Apply correction",
            handler_fn(move |input, ctx, _cancel| {
                let content = Arc::clone(&content);
                async move {
                    let action: AuditAction = serde_json::from_value(input)
                        .map_err(|e| StepError::InvalidPayload(format!("expected action: {e}")))?;

                    match action {
                        AuditAction::Skip { .. } => Ok(json!({
                            "was_updated": false,
                            "skipped": true,
                        })),
                        AuditAction::Apply {
                            title,
                            excerpt,
                            language_code,
                        } => {
                            let post_id = parse_post_id(ctx.input())?;
                            let metadata = pressline_types::content::PostMetadata {
                                title,
                                excerpt,
                            };
                            // A failed correction must not fail the audit of
                            // this item; surface the error as data instead.
                            match content
                                .update_metadata(&post_id, &language_code, &metadata)
                                .await
                            {
                                Ok(()) => Ok(json!({
                                    "was_updated": true,
                                    "skipped": false,
                                })),
                                Err(err) => {
                                    tracing::warn!(
                                        post_id = %post_id,
                                        error = %err,
                                        "correction write failed, reporting only"
                                    );
                                    Ok(json!({
                                        "was_updated": false,
                                        "skipped": false,
                                        "error": err.to_string(),
                                    }))
                                }
                            }
                        }
                    }
                }
            }),
        )
    };

    let report = StepDefinition::new(
        "report",
        "Assemble audit report",
        handler_fn(|input, ctx, _cancel| async move {
            let post: Post = ctx
                .get("fetch-post")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| StepError::InvalidPayload(format!("bad fetch-post entry: {e}")))?
                .ok_or_else(|| {
                    StepError::InvalidPayload("missing fetch-post checkpoint".to_string())
                })?;

            let action: AuditAction = ctx
                .get("decide")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| StepError::InvalidPayload(format!("bad decide entry: {e}")))?
                .ok_or_else(|| {
                    StepError::InvalidPayload("missing decide checkpoint".to_string())
                })?;

            let (consistent, skip_reason) = match &action {
                AuditAction::Skip { reason } => (true, Some(reason.clone())),
                AuditAction::Apply { .. } => (false, None),
            };

            // `input` here is the apply-correction output.
            let report = AuditReport {
                post_id: post.id,
                slug: post.slug,
                language_code: post.language_code,
                consistent,
                was_updated: input["was_updated"].as_bool().unwrap_or(false),
                skip_reason,
                correction_error: input["error"].as_str().map(str::to_string),
            };

            serde_json::to_value(&report).map_err(|e| StepError::ExecutionFailed(e.to_string()))
        }),
    );

    WorkflowDefinition {
        id: CHILD_DEFINITION_ID.to_string(),
        name: "Per-post consistency audit".to_string(),
        steps: vec![fetch, judge, decide, apply, report],
        input_contract: InputContract::required(&["post_id"]),
    }
}

/// Extract and parse the `post_id` field of an input object.
fn parse_post_id(input: &Value) -> Result<Uuid, StepError> {
    input["post_id"]
        .as_str()
        .ok_or_else(|| StepError::InvalidPayload("missing post_id".to_string()))?
        .parse()
        .map_err(|e| StepError::InvalidPayload(format!("bad post_id: {e}")))
}
