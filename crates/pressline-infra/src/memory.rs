//! In-memory instance repository.
//!
//! DashMap-backed, suitable for a single-process deployment or tests.
//! `update` enforces the version compare-and-set from the repository
//! contract, so a stale write surfaces as a conflict instead of silently
//! clobbering a newer snapshot.

use dashmap::DashMap;
use pressline_core::repository::InstanceRepository;
use pressline_types::error::RepositoryError;
use pressline_types::workflow::{InstanceFilter, InstancePage, WorkflowInstance};
use uuid::Uuid;

/// DashMap-backed implementation of `InstanceRepository`.
#[derive(Debug, Default)]
pub struct MemoryInstanceRepository {
    instances: DashMap<Uuid, WorkflowInstance>,
}

impl MemoryInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstanceRepository for MemoryInstanceRepository {
    async fn create(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError> {
        match self.instances.entry(instance.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(RepositoryError::Conflict(
                format!("instance {} already exists", instance.id),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(instance.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError> {
        // The entry guard serializes per-id writes.
        let mut stored = self
            .instances
            .get_mut(&instance.id)
            .ok_or(RepositoryError::NotFound)?;

        if stored.version + 1 != instance.version {
            return Err(RepositoryError::Conflict(format!(
                "stale write for instance {}: stored version {}, incoming {}",
                instance.id, stored.version, instance.version
            )));
        }

        *stored = instance.clone();
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<WorkflowInstance>, RepositoryError> {
        Ok(self.instances.get(id).map(|entry| entry.clone()))
    }

    async fn list(&self, filter: &InstanceFilter) -> Result<InstancePage, RepositoryError> {
        let mut matching: Vec<WorkflowInstance> = self
            .instances
            .iter()
            .filter(|entry| {
                filter
                    .definition_id
                    .as_deref()
                    .is_none_or(|id| entry.definition_id == id)
            })
            .map(|entry| entry.clone())
            .collect();

        // Newest first; id is a UUIDv7 so it tie-breaks identical timestamps.
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as u64;
        let page = filter.page.max(1);
        let start = ((page - 1) as usize).saturating_mul(filter.per_page as usize);
        let instances = matching
            .into_iter()
            .skip(start)
            .take(filter.per_page as usize)
            .collect();

        Ok(InstancePage {
            instances,
            page,
            per_page: filter.per_page,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pressline_types::workflow::InstanceStatus;
    use serde_json::json;

    fn instance(definition_id: &str) -> WorkflowInstance {
        WorkflowInstance::new(definition_id.to_string(), json!({}), None)
    }

    #[tokio::test]
    async fn test_create_get_roundtrip() {
        let repo = MemoryInstanceRepository::new();
        let inst = instance("metadata-enrich");
        repo.create(&inst).await.unwrap();

        let fetched = repo.get(&inst.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, inst.id);
        assert_eq!(fetched.status, InstanceStatus::Pending);
        assert!(repo.get(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_conflicts() {
        let repo = MemoryInstanceRepository::new();
        let inst = instance("metadata-enrich");
        repo.create(&inst).await.unwrap();
        assert!(matches!(
            repo.create(&inst).await.unwrap_err(),
            RepositoryError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_update_enforces_version_cas() {
        let repo = MemoryInstanceRepository::new();
        let mut inst = instance("metadata-enrich");
        repo.create(&inst).await.unwrap();

        inst.version = 1;
        inst.status = InstanceStatus::Running;
        repo.update(&inst).await.unwrap();

        // Replaying the same version is a stale write.
        assert!(matches!(
            repo.update(&inst).await.unwrap_err(),
            RepositoryError::Conflict(_)
        ));

        // Skipping a version is also stale.
        inst.version = 5;
        assert!(matches!(
            repo.update(&inst).await.unwrap_err(),
            RepositoryError::Conflict(_)
        ));

        let unknown = instance("metadata-enrich");
        assert!(matches!(
            repo.update(&unknown).await.unwrap_err(),
            RepositoryError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filter_and_paging() {
        let repo = MemoryInstanceRepository::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let def = if i % 2 == 0 { "audit-post" } else { "metadata-enrich" };
            let inst = instance(def);
            ids.push(inst.id);
            repo.create(&inst).await.unwrap();
        }

        let page = repo
            .list(&InstanceFilter {
                definition_id: Some("audit-post".to_string()),
                page: 1,
                per_page: 2,
            })
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.instances.len(), 2);
        // UUIDv7 ids are time-ordered; newest (last created) comes first.
        assert_eq!(page.instances[0].id, ids[4]);
        assert_eq!(page.instances[1].id, ids[2]);

        let page2 = repo
            .list(&InstanceFilter {
                definition_id: Some("audit-post".to_string()),
                page: 2,
                per_page: 2,
            })
            .await
            .unwrap();
        assert_eq!(page2.instances.len(), 1);
        assert_eq!(page2.instances[0].id, ids[0]);
    }
}
