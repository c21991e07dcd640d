//! Infrastructure layer for Pressline.
//!
//! Implements the ports defined in `pressline-core`:
//! - `memory` -- DashMap-backed instance repository (single process)
//! - `sqlite` -- SQLite instance repository with WAL split pools
//! - `config` -- `config.toml` loading with defaults
//! - `placeholder` -- deterministic collaborator implementations for local
//!   runs without any AI or CMS backend

pub mod config;
pub mod memory;
pub mod placeholder;
pub mod sqlite;
