//! SQLite instance repository implementation.
//!
//! Implements `InstanceRepository` from `pressline-core` using sqlx with
//! split read/write pools. Context snapshots and outputs are stored as JSON
//! text; the `version` column backs the compare-and-set update contract.

use chrono::{DateTime, Utc};
use pressline_core::repository::InstanceRepository;
use pressline_types::error::RepositoryError;
use pressline_types::workflow::{
    ContextSnapshot, InstanceFilter, InstancePage, InstanceStatus, WorkflowInstance,
};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `InstanceRepository`.
pub struct SqliteInstanceRepository {
    pool: DatabasePool,
}

impl SqliteInstanceRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct InstanceRow {
    id: String,
    definition_id: String,
    status: String,
    error: Option<String>,
    context: String,
    output: Option<String>,
    spawned_by: Option<String>,
    created_at: String,
    finished_at: Option<String>,
    version: i64,
}

impl InstanceRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            definition_id: row.try_get("definition_id")?,
            status: row.try_get("status")?,
            error: row.try_get("error")?,
            context: row.try_get("context")?,
            output: row.try_get("output")?,
            spawned_by: row.try_get("spawned_by")?,
            created_at: row.try_get("created_at")?,
            finished_at: row.try_get("finished_at")?,
            version: row.try_get("version")?,
        })
    }

    fn into_instance(self) -> Result<WorkflowInstance, RepositoryError> {
        let id = parse_uuid(&self.id)?;
        let status: InstanceStatus =
            serde_json::from_value(serde_json::Value::String(self.status.clone())).map_err(
                |_| RepositoryError::Query(format!("invalid instance status: {}", self.status)),
            )?;

        let context: ContextSnapshot = serde_json::from_str(&self.context)
            .map_err(|e| RepositoryError::Query(format!("invalid context JSON: {e}")))?;

        let output = self
            .output
            .as_deref()
            .map(|s| {
                serde_json::from_str(s)
                    .map_err(|e| RepositoryError::Query(format!("invalid output JSON: {e}")))
            })
            .transpose()?;

        let spawned_by = self.spawned_by.as_deref().map(parse_uuid).transpose()?;
        let created_at = parse_datetime(&self.created_at)?;
        let finished_at = self
            .finished_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        Ok(WorkflowInstance {
            id,
            definition_id: self.definition_id,
            status,
            error: self.error,
            context,
            output,
            spawned_by,
            created_at,
            finished_at,
            version: self.version as u64,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse()
        .map_err(|_| RepositoryError::Query(format!("invalid UUID: {s}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RepositoryError::Query(format!("invalid timestamp: {s}")))
}

fn status_text(status: InstanceStatus) -> Result<String, RepositoryError> {
    match serde_json::to_value(status) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        _ => Err(RepositoryError::Query("unserializable status".to_string())),
    }
}

fn map_sqlx(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => RepositoryError::Connection,
        other => RepositoryError::Query(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Repository implementation
// ---------------------------------------------------------------------------

impl InstanceRepository for SqliteInstanceRepository {
    async fn create(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError> {
        let context = serde_json::to_string(&instance.context)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let output = instance
            .output
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO workflow_instances
                (id, definition_id, status, error, context, output, spawned_by,
                 created_at, finished_at, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(instance.id.to_string())
        .bind(&instance.definition_id)
        .bind(status_text(instance.status)?)
        .bind(&instance.error)
        .bind(context)
        .bind(output)
        .bind(instance.spawned_by.map(|id| id.to_string()))
        .bind(instance.created_at.to_rfc3339())
        .bind(instance.finished_at.map(|t| t.to_rfc3339()))
        .bind(instance.version as i64)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(
                format!("instance {} already exists", instance.id),
            ),
            other => map_sqlx(other),
        })?;

        Ok(())
    }

    async fn update(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError> {
        let context = serde_json::to_string(&instance.context)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let output = instance
            .output
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // CAS: only the directly preceding version may be replaced.
        let result = sqlx::query(
            r#"
            UPDATE workflow_instances
            SET status = ?, error = ?, context = ?, output = ?,
                finished_at = ?, version = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(status_text(instance.status)?)
        .bind(&instance.error)
        .bind(context)
        .bind(output)
        .bind(instance.finished_at.map(|t| t.to_rfc3339()))
        .bind(instance.version as i64)
        .bind(instance.id.to_string())
        .bind(instance.version as i64 - 1)
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return match self.get(&instance.id).await? {
                Some(stored) => Err(RepositoryError::Conflict(format!(
                    "stale write for instance {}: stored version {}, incoming {}",
                    instance.id, stored.version, instance.version
                ))),
                None => Err(RepositoryError::NotFound),
            };
        }

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<WorkflowInstance>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM workflow_instances WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(map_sqlx)?;

        row.map(|r| {
            InstanceRow::from_row(&r)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_instance()
        })
        .transpose()
    }

    async fn list(&self, filter: &InstanceFilter) -> Result<InstancePage, RepositoryError> {
        let page = filter.page.max(1);
        let offset = (page as i64 - 1) * filter.per_page as i64;

        let (rows, total) = if let Some(definition_id) = &filter.definition_id {
            let rows = sqlx::query(
                r#"
                SELECT * FROM workflow_instances
                WHERE definition_id = ?
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(definition_id)
            .bind(filter.per_page as i64)
            .bind(offset)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx)?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM workflow_instances WHERE definition_id = ?",
            )
            .bind(definition_id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(map_sqlx)?;

            (rows, total)
        } else {
            let rows = sqlx::query(
                r#"
                SELECT * FROM workflow_instances
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(filter.per_page as i64)
            .bind(offset)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx)?;

            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workflow_instances")
                .fetch_one(&self.pool.reader)
                .await
                .map_err(map_sqlx)?;

            (rows, total)
        };

        let instances = rows
            .iter()
            .map(|r| {
                InstanceRow::from_row(r)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_instance()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(InstancePage {
            instances,
            page,
            per_page: filter.per_page,
            total: total as u64,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
