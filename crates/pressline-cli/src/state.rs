//! Application state wiring the engine, catalog, and collaborators together.
//!
//! Core components are generic over the repository and collaborator traits;
//! AppState pins them to the concrete infra implementations: the SQLite
//! instance repository plus the deterministic placeholder collaborators.

use std::path::PathBuf;
use std::sync::Arc;

use pressline_core::{FanOutCoordinator, WorkflowCatalog, WorkflowEngine, compose};
use pressline_infra::config::{default_data_dir, load_global_config, resolve_database_url};
use pressline_infra::placeholder::{
    HeuristicGenerator, MemoryContentStore, RuleJudgment, seed_posts,
};
use pressline_infra::sqlite::{DatabasePool, SqliteInstanceRepository};
use pressline_types::config::GlobalConfig;

/// Engine pinned to the SQLite repository.
pub type ConcreteEngine = WorkflowEngine<SqliteInstanceRepository>;

/// Shared application state for CLI command handlers.
pub struct AppState {
    pub engine: ConcreteEngine,
    pub content: Arc<MemoryContentStore>,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: connect to the database, register
    /// the built-in workflow definitions, and seed `seed` demo posts into
    /// the in-memory content store.
    pub async fn init(seed: usize) -> anyhow::Result<Self> {
        let data_dir = default_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;
        let db_url = resolve_database_url(&config, &data_dir);
        let pool = DatabasePool::new(&db_url).await?;

        let repo = Arc::new(SqliteInstanceRepository::new(pool));
        let catalog = Arc::new(WorkflowCatalog::new());
        let engine = WorkflowEngine::new(repo, Arc::clone(&catalog));

        let content = Arc::new(MemoryContentStore::with_posts(seed_posts(seed)));

        compose::audit::register(
            &catalog,
            FanOutCoordinator::new(engine.clone()),
            Arc::clone(&content),
            Arc::new(RuleJudgment::new()),
        )?;
        compose::enrich::register(
            &catalog,
            Arc::clone(&content),
            Arc::new(HeuristicGenerator::new()),
        )?;

        Ok(Self {
            engine,
            content,
            config,
            data_dir,
        })
    }
}
