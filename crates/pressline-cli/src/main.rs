//! Pressline CLI entry point.
//!
//! Binary name: `pressline`
//!
//! Parses CLI arguments, initializes the database and workflow catalog, then
//! dispatches to the appropriate command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands, InstancesCommand, RunCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,pressline=debug",
        _ => "trace",
    };
    pressline_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init(cli.seed).await?;

    let result = match cli.command {
        Commands::Run { command } => match command {
            RunCommand::Audit { per_page } => {
                cli::run::run_audit(&state, per_page, cli.json).await
            }
            RunCommand::Enrich {
                post_id,
                text,
                title,
                excerpt,
            } => {
                cli::run::run_enrich(
                    &state,
                    post_id,
                    text.as_deref(),
                    title.as_deref(),
                    excerpt.as_deref(),
                    cli.json,
                )
                .await
            }
        },

        Commands::Instances { command } => match command {
            InstancesCommand::List {
                definition,
                page,
                per_page,
            } => {
                cli::instances::list_instances(&state, definition.as_deref(), page, per_page, cli.json)
                    .await
            }
            InstancesCommand::Status { id } => {
                cli::instances::show_instance(&state, &id, cli.json).await
            }
            InstancesCommand::Cancel { id } => {
                cli::instances::cancel_instance(&state, &id, cli.json).await
            }
        },
    };

    pressline_observe::tracing_setup::shutdown_tracing();
    result
}
