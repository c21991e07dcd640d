//! CLI argument definitions and command handlers.

pub mod instances;
pub mod run;

use clap::{Parser, Subcommand};

/// Pressline: a content workflow engine.
#[derive(Parser)]
#[command(name = "pressline", version, about)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Export spans via OpenTelemetry (stdout exporter)
    #[arg(long, global = true)]
    pub otel: bool,

    /// Number of demo posts to seed into the content store
    #[arg(long, default_value = "9", global = true)]
    pub seed: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow to completion.
    Run {
        #[command(subcommand)]
        command: RunCommand,
    },

    /// Inspect workflow instances.
    Instances {
        #[command(subcommand)]
        command: InstancesCommand,
    },
}

#[derive(Subcommand)]
pub enum RunCommand {
    /// Audit every post's metadata for consistency with its body.
    Audit {
        /// Page size used when collecting post ids.
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Enrich one post: detect language, fill missing metadata, persist.
    Enrich {
        /// Target post id (defaults to the first seeded post).
        #[arg(long)]
        post_id: Option<String>,

        /// Body text to analyze (defaults to the post's stored body).
        #[arg(long)]
        text: Option<String>,

        /// Existing title, kept if present.
        #[arg(long)]
        title: Option<String>,

        /// Existing excerpt, kept if present.
        #[arg(long)]
        excerpt: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum InstancesCommand {
    /// List instances, newest first.
    List {
        /// Filter by workflow definition id.
        #[arg(long)]
        definition: Option<String>,

        /// 1-based page number.
        #[arg(long, default_value = "1")]
        page: u32,

        /// Page size (defaults to the configured value).
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Show one instance by id.
    Status {
        /// Instance UUID.
        id: String,
    },

    /// Request cancellation of an in-flight instance.
    Cancel {
        /// Instance UUID.
        id: String,
    },
}
