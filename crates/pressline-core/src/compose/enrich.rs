//! Metadata enrichment for a single post.
//!
//! `metadata-enrich` detects the language of a submitted text, generates
//! title/excerpt for whichever fields are missing, and persists the result.
//! Unlike the audit's correction step, a persistence failure here *is* fatal
//! to the instance -- the workflow's whole point is the write.
//!
//! `generate-if-missing` reads the caller's original title/excerpt from the
//! context's `input` checkpoint rather than requiring `detect-language` to
//! re-thread them through its own output.

use std::sync::Arc;

use pressline_types::content::PostMetadata;
use serde_json::json;

use crate::catalog::{CatalogError, InputContract, WorkflowCatalog, WorkflowDefinition};
use crate::collab::{ContentStore, MetadataGenerator};
use crate::step::{StepDefinition, StepError, handler_fn};

/// Catalog id of the enrichment workflow.
pub const DEFINITION_ID: &str = "metadata-enrich";

/// Register the enrichment workflow into the catalog.
pub fn register<C, G>(
    catalog: &WorkflowCatalog,
    content: Arc<C>,
    generator: Arc<G>,
) -> Result<(), CatalogError>
where
    C: ContentStore + 'static,
    G: MetadataGenerator + 'static,
{
    catalog.register(definition(content, generator))
}

/// Build the enrichment definition:
/// detect-language -> generate-if-missing -> persist.
pub fn definition<C, G>(content: Arc<C>, generator: Arc<G>) -> WorkflowDefinition
where
    C: ContentStore + 'static,
    G: MetadataGenerator + 'static,
{
    let detect = {
        let generator = Arc::clone(&generator);
        StepDefinition::new(
            "detect-language",
            "Detect language",
            handler_fn(move |input, _ctx, _cancel| {
                let generator = Arc::clone(&generator);
                async move {
                    let text = input["text"]
                        .as_str()
                        .ok_or_else(|| StepError::InvalidPayload("missing text".to_string()))?;
                    let language_code = generator
                        .detect_language(text)
                        .await
                        .map_err(StepError::failed)?;
                    Ok(json!({ "language_code": language_code }))
                }
            }),
        )
    };

    let generate = StepDefinition::new(
        "generate-if-missing",
        "Generate missing metadata",
        handler_fn(move |input, ctx, _cancel| {
            let generator = Arc::clone(&generator);
            async move {
                let language_code = input["language_code"]
                    .as_str()
                    .ok_or_else(|| {
                        StepError::InvalidPayload("missing language_code".to_string())
                    })?
                    .to_string();

                // Original submission fields, via the named checkpoint.
                let original = ctx.input();
                let text = original["text"].as_str().unwrap_or_default().to_string();
                let mut title = original["title"].as_str().unwrap_or_default().to_string();
                let mut excerpt = original["excerpt"].as_str().unwrap_or_default().to_string();

                if title.trim().is_empty() || excerpt.trim().is_empty() {
                    let generated = generator
                        .generate(&text, &language_code)
                        .await
                        .map_err(StepError::failed)?;
                    if title.trim().is_empty() {
                        title = generated.title;
                    }
                    if excerpt.trim().is_empty() {
                        excerpt = generated.excerpt;
                    }
                }

                Ok(json!({
                    "title": title,
                    "excerpt": excerpt,
                    "language_code": language_code,
                }))
            }
        }),
    );

    let persist = StepDefinition::new(
        "persist",
        "Persist metadata",
        handler_fn(move |input, ctx, _cancel| {
            let content = Arc::clone(&content);
            async move {
                let post_id = ctx.input()["post_id"]
                    .as_str()
                    .ok_or_else(|| StepError::InvalidPayload("missing post_id".to_string()))?
                    .parse()
                    .map_err(|e| StepError::InvalidPayload(format!("bad post_id: {e}")))?;

                let language_code = input["language_code"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let metadata = PostMetadata {
                    title: input["title"].as_str().unwrap_or_default().to_string(),
                    excerpt: input["excerpt"].as_str().unwrap_or_default().to_string(),
                };

                content
                    .update_metadata(&post_id, &language_code, &metadata)
                    .await
                    .map_err(StepError::failed)?;

                Ok(json!({
                    "post_id": post_id.to_string(),
                    "title": metadata.title,
                    "excerpt": metadata.excerpt,
                    "language_code": language_code,
                    "persisted": true,
                }))
            }
        }),
    );

    WorkflowDefinition {
        id: DEFINITION_ID.to_string(),
        name: "Metadata enrichment".to_string(),
        steps: vec![detect, generate, persist],
        input_contract: InputContract::required(&["post_id", "text"]),
    }
}
