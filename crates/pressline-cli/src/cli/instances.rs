//! `pressline instances` command handlers.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use pressline_types::workflow::{InstanceFilter, InstanceStatus};

use crate::state::AppState;

/// List registered instances, newest first.
pub async fn list_instances(
    state: &AppState,
    definition: Option<&str>,
    page: u32,
    per_page: Option<u32>,
    json: bool,
) -> Result<()> {
    let filter = InstanceFilter {
        definition_id: definition.map(str::to_string),
        page,
        per_page: per_page.unwrap_or(state.config.default_per_page),
    };
    let listing = state.engine.list(&filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if listing.instances.is_empty() {
        println!();
        println!("  No instances found.");
        println!(
            "  Run a workflow with: {}",
            style("pressline run audit").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Definition"),
            Cell::new("Status"),
            Cell::new("Created"),
            Cell::new("Finished"),
        ]);

    for instance in &listing.instances {
        let finished = instance
            .finished_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(short_id(&instance.id)),
            Cell::new(&instance.definition_id),
            status_cell(instance.status),
            Cell::new(instance.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(finished),
        ]);
    }

    println!();
    println!(
        "  Instances (page {} of {} total)",
        listing.page,
        listing.total
    );
    println!();
    println!("{table}");
    println!();

    Ok(())
}

/// Show the full snapshot of one instance.
pub async fn show_instance(state: &AppState, id: &str, json: bool) -> Result<()> {
    let instance_id: Uuid = id.parse().with_context(|| format!("invalid instance id: '{id}'"))?;
    let instance = state.engine.status(instance_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&instance)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Instance {}",
        style("Workflow:").bold(),
        style(short_id(&instance.id)).cyan()
    );
    println!("  Definition: {}", style(&instance.definition_id).cyan());
    println!("  Status: {:?}", instance.status);
    if let Some(parent) = instance.spawned_by {
        println!("  Spawned by: {}", short_id(&parent));
    }
    println!("  Created: {}", instance.created_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(finished) = instance.finished_at {
        println!("  Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(err) = &instance.error {
        println!("  Error: {}", style(err).red());
    }

    println!("  Steps recorded:");
    for entry in instance.context.iter() {
        println!("    - {}", entry.step_id);
    }

    if let Some(output) = &instance.output {
        println!("  Output:");
        let pretty = serde_json::to_string_pretty(output)?;
        for line in pretty.lines() {
            println!("    {line}");
        }
    }
    println!();

    Ok(())
}

/// Request cancellation of an in-flight instance.
///
/// The engine flips the instance's cancellation token; the driver observes
/// it between steps, so the instance finishes its current step first.
pub async fn cancel_instance(state: &AppState, id: &str, json: bool) -> Result<()> {
    let instance_id: Uuid = id.parse().with_context(|| format!("invalid instance id: '{id}'"))?;
    state.engine.cancel(instance_id)?;

    if json {
        let out = serde_json::json!({
            "instance_id": instance_id.to_string(),
            "cancellation_requested": true,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Cancellation requested for instance {}",
        style("*").green().bold(),
        style(short_id(&instance_id)).cyan()
    );
    println!(
        "  Check the outcome with: {}",
        style(format!("pressline instances status {instance_id}")).dim()
    );
    println!();

    Ok(())
}

fn short_id(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn status_cell(status: InstanceStatus) -> Cell {
    match status {
        InstanceStatus::Succeeded => Cell::new("succeeded").fg(Color::Green),
        InstanceStatus::Failed => Cell::new("failed").fg(Color::Red),
        InstanceStatus::Running => Cell::new("running").fg(Color::Yellow),
        InstanceStatus::Pending => Cell::new("pending"),
        InstanceStatus::Canceled => Cell::new("canceled").fg(Color::Magenta),
    }
}
