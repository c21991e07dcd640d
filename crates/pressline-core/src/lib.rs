//! Workflow engine core for Pressline.
//!
//! This crate contains the orchestration layer and its ports:
//! - `context` -- insertion-ordered execution context with named checkpoints
//! - `step` -- step definitions, the handler trait, and the step runner
//! - `catalog` -- register-once workflow definition catalog with validation
//! - `engine` -- sequential per-instance executor with status tracking
//! - `fanout` -- fire-and-forget fan-out coordinator
//! - `repository` -- instance storage port (implemented in pressline-infra)
//! - `collab` -- collaborator ports (content store, judgment, generator)
//! - `compose` -- reference compositions (content audit, metadata enrichment)
//!
//! It depends only on `pressline-types` -- never on any database or IO crate.

pub mod catalog;
pub mod collab;
pub mod compose;
pub mod context;
pub mod engine;
pub mod fanout;
pub mod repository;
pub mod step;

pub use catalog::{CatalogError, InputContract, WorkflowCatalog, WorkflowDefinition};
pub use context::{ContextError, ExecutionContext, INPUT_KEY};
pub use engine::{EngineError, WorkflowEngine};
pub use fanout::{ChildSpawnInput, FanOutCoordinator};
pub use repository::InstanceRepository;
pub use step::{StepDefinition, StepError, StepHandler, handler_fn};
