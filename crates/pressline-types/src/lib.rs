//! Shared domain types for Pressline.
//!
//! This crate holds the serializable vocabulary of the system: workflow
//! instances and their status machine, fan-out spawn records, content
//! documents and their localized metadata, audit verdicts, and the error
//! taxonomy used by repository and collaborator traits. It depends only on
//! serde-family crates -- never on the engine or any IO crate.

pub mod audit;
pub mod config;
pub mod content;
pub mod error;
pub mod workflow;
