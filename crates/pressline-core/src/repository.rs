//! Instance repository trait definition.
//!
//! The registry of `WorkflowInstance` records is the only resource shared
//! across concurrently running instances. Implementations live in
//! `pressline-infra` (DashMap memory, SQLite); the contract does not mandate
//! durability.
//!
//! Callers always write a full updated snapshot, never partial patches, and
//! every write carries a bumped `version`; `update` must reject a write whose
//! version does not directly follow the stored one, so a racing stale write
//! surfaces as `RepositoryError::Conflict` instead of a lost update.
//!
//! Uses native async fn in traits via RPITIT (Rust 2024 edition, no
//! async_trait macro).

use pressline_types::error::RepositoryError;
use pressline_types::workflow::{InstanceFilter, InstancePage, WorkflowInstance};
use uuid::Uuid;

/// Storage port for workflow instances. No deletion operation: the system
/// never deletes instances, only the content items they describe.
pub trait InstanceRepository: Send + Sync {
    /// Persist a freshly created instance (version 0).
    fn create(
        &self,
        instance: &WorkflowInstance,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Replace the stored snapshot with `instance`.
    ///
    /// Must succeed only when the stored version equals `instance.version - 1`.
    fn update(
        &self,
        instance: &WorkflowInstance,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Fetch an instance snapshot by id.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl Future<Output = Result<Option<WorkflowInstance>, RepositoryError>> + Send;

    /// List instances newest first by `created_at`, optionally filtered by
    /// definition id.
    fn list(
        &self,
        filter: &InstanceFilter,
    ) -> impl Future<Output = Result<InstancePage, RepositoryError>> + Send;
}
