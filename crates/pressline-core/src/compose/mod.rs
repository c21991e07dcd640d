//! Reference workflow compositions.
//!
//! Consumers of the engine API, not part of the engine itself:
//! - `audit` -- bulk consistency audit (master fan-out + per-post child)
//! - `enrich` -- metadata enrichment for a single post
//!
//! Both are built from plain step handlers over the collaborator traits and
//! register themselves into a `WorkflowCatalog`.

pub mod audit;
pub mod enrich;
