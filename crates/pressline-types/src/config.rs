//! Global configuration shape, loaded from `config.toml` in the data dir.

use serde::{Deserialize, Serialize};

/// Default page size for instance and post listings.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Global configuration for a Pressline deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default page size for list operations.
    pub default_per_page: u32,
    /// SQLite database URL override (defaults to `{data_dir}/pressline.db`).
    pub database_url: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
            database_url: None,
        }
    }
}
