//! `pressline run` command handlers.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::json;
use uuid::Uuid;

use pressline_core::compose::{audit, enrich};
use pressline_types::audit::AuditReport;
use pressline_types::workflow::{FanOutSummary, InstanceStatus, SpawnStatus, WorkflowInstance};

use crate::state::AppState;

/// Poll interval while waiting for fan-out children to finish.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Run the full content audit: master run, then wait for every spawned
/// child and render the per-post reports.
pub async fn run_audit(state: &AppState, per_page: Option<u32>, json: bool) -> Result<()> {
    let input = match per_page {
        Some(n) => json!({ "per_page": n }),
        None => json!({}),
    };

    let master = state
        .engine
        .run(audit::MASTER_DEFINITION_ID, input)
        .await
        .context("audit master run failed to start")?;

    if master.status != InstanceStatus::Succeeded {
        bail!(
            "audit master instance {} finished as {:?}: {}",
            master.id,
            master.status,
            master.error.as_deref().unwrap_or("no error recorded")
        );
    }

    let summary: FanOutSummary = master
        .output
        .clone()
        .map(serde_json::from_value)
        .transpose()
        .context("audit master produced an unreadable fan-out summary")?
        .context("audit master produced no output")?;

    // Children run detached; poll each to a terminal state.
    let mut reports: Vec<AuditReport> = Vec::new();
    let mut failed_children: Vec<WorkflowInstance> = Vec::new();
    for child_id in &summary.child_instance_ids {
        let child = wait_for_terminal(state, *child_id).await?;
        match child.status {
            InstanceStatus::Succeeded => {
                let report = child
                    .output
                    .clone()
                    .map(serde_json::from_value)
                    .transpose()
                    .with_context(|| format!("child {child_id} produced an unreadable report"))?
                    .with_context(|| format!("child {child_id} produced no report"))?;
                reports.push(report);
            }
            _ => failed_children.push(child),
        }
    }

    if json {
        let out = json!({
            "master_instance_id": master.id.to_string(),
            "summary": summary,
            "reports": reports,
            "failed_children": failed_children
                .iter()
                .map(|c| json!({
                    "instance_id": c.id.to_string(),
                    "status": c.status,
                    "error": c.error,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Audited {} posts ({} spawned, {} launch failures)",
        style("*").green().bold(),
        summary.total_items,
        summary.succeeded_spawns,
        summary.failed_spawns,
    );
    println!();

    if !reports.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Slug").fg(Color::Cyan),
                Cell::new("Lang"),
                Cell::new("Consistent"),
                Cell::new("Updated"),
                Cell::new("Note"),
            ]);

        for r in &reports {
            let note = r
                .correction_error
                .as_deref()
                .or(r.skip_reason.as_deref())
                .unwrap_or("-");
            table.add_row(vec![
                Cell::new(&r.slug),
                Cell::new(&r.language_code),
                Cell::new(if r.consistent { "yes" } else { "no" }),
                Cell::new(if r.was_updated { "yes" } else { "no" }),
                Cell::new(note),
            ]);
        }

        println!("{table}");
        println!();
    }

    for record in summary
        .records
        .iter()
        .filter(|r| r.status == SpawnStatus::Failed)
    {
        println!(
            "  {} launch failed for item '{}': {}",
            style("✗").red(),
            record.item_key,
            record.error.as_deref().unwrap_or("unknown error")
        );
    }
    for child in &failed_children {
        println!(
            "  {} child {} finished as {:?}: {}",
            style("✗").red(),
            child.id,
            child.status,
            child.error.as_deref().unwrap_or("no error recorded")
        );
    }
    if summary.failed_spawns > 0 || !failed_children.is_empty() {
        println!();
    }

    Ok(())
}

async fn wait_for_terminal(state: &AppState, instance_id: Uuid) -> Result<WorkflowInstance> {
    loop {
        let instance = state.engine.status(instance_id).await?;
        if instance.status.is_terminal() {
            return Ok(instance);
        }
        tokio::time::sleep(CHILD_POLL_INTERVAL).await;
    }
}

// ---------------------------------------------------------------------------
// Enrich
// ---------------------------------------------------------------------------

/// Run the metadata enrichment workflow against one post.
pub async fn run_enrich(
    state: &AppState,
    post_id: Option<String>,
    text: Option<&str>,
    title: Option<&str>,
    excerpt: Option<&str>,
    json: bool,
) -> Result<()> {
    use pressline_core::collab::ContentStore;

    // Default to the first seeded post when no id is given.
    let post_id: Uuid = match post_id {
        Some(raw) => raw.parse().with_context(|| format!("invalid post id: '{raw}'"))?,
        None => {
            let page = state.content.list_posts(1, 1).await?;
            match page.posts.first() {
                Some(post) => post.id,
                None => bail!("content store is empty; pass --post-id or --seed"),
            }
        }
    };

    let body = match text {
        Some(text) => text.to_string(),
        None => state
            .content
            .get_post(&post_id)
            .await?
            .with_context(|| format!("post {post_id} not found"))?
            .body,
    };

    let mut input = json!({
        "post_id": post_id.to_string(),
        "text": body,
    });
    if let Some(title) = title {
        input["title"] = json!(title);
    }
    if let Some(excerpt) = excerpt {
        input["excerpt"] = json!(excerpt);
    }

    let instance = state.engine.run(enrich::DEFINITION_ID, input).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&instance)?);
        return Ok(());
    }

    println!();
    match instance.status {
        InstanceStatus::Succeeded => {
            println!(
                "  {} Enriched post {}",
                style("*").green().bold(),
                style(post_id).cyan()
            );
            if let Some(output) = &instance.output {
                println!("  Language: {}", output["language_code"].as_str().unwrap_or("?"));
                println!("  Title: {}", output["title"].as_str().unwrap_or("?"));
                println!("  Excerpt: {}", output["excerpt"].as_str().unwrap_or("?"));
            }
        }
        _ => {
            println!(
                "  {} Enrichment of post {} finished as {:?}",
                style("✗").red(),
                post_id,
                instance.status
            );
            if let Some(err) = &instance.error {
                println!("  Error: {}", style(err).red());
            }
        }
    }
    println!("  Instance: {}", instance.id);
    println!();

    Ok(())
}
