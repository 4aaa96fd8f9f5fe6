use memoh_core::types::{BotId, ContainerId, ContainerVersionId, SnapshotId};

use crate::model::{
    Container, ContainerRow, ContainerStatus, ContainerVersion, ContainerVersionRow, Snapshot,
    SnapshotRow,
};
use crate::{DbError, PgPool, Result};

pub async fn create(pool: &PgPool, bot_id: BotId, image: &str, host_path: &str) -> Result<Container> {
    let id = ContainerId::new();
    let row = sqlx::query_as::<_, ContainerRow>(
        "INSERT INTO containers (id, bot_id, image, status, host_path)
         VALUES ($1, $2, $3, 'creating', $4)
         RETURNING id, bot_id, runtime_ref, image, status, host_path, metadata,
         last_started_at, last_stopped_at, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(bot_id.as_uuid())
    .bind(image)
    .bind(host_path)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: ContainerId) -> Result<Container> {
    let row = sqlx::query_as::<_, ContainerRow>(
        "SELECT id, bot_id, runtime_ref, image, status, host_path, metadata,
         last_started_at, last_stopped_at, created_at, updated_at
         FROM containers WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("container {id}")))?;
    Ok(row.into())
}

pub async fn get_for_bot(pool: &PgPool, bot_id: BotId) -> Result<Option<Container>> {
    let row = sqlx::query_as::<_, ContainerRow>(
        "SELECT id, bot_id, runtime_ref, image, status, host_path, metadata,
         last_started_at, last_stopped_at, created_at, updated_at
         FROM containers WHERE bot_id = $1",
    )
    .bind(bot_id.as_uuid())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

pub async fn set_status(
    pool: &PgPool,
    id: ContainerId,
    status: ContainerStatus,
    runtime_ref: Option<&str>,
) -> Result<()> {
    let affected = sqlx::query(
        "UPDATE containers SET status = $2, runtime_ref = COALESCE($3, runtime_ref),
         updated_at = now() WHERE id = $1",
    )
    .bind(id.as_uuid())
    .bind(status.as_str())
    .bind(runtime_ref)
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("container {id}")));
    }
    Ok(())
}

pub async fn mark_started(pool: &PgPool, id: ContainerId, runtime_ref: Option<&str>) -> Result<()> {
    let affected = sqlx::query(
        "UPDATE containers SET status = 'running', runtime_ref = COALESCE($2, runtime_ref),
         last_started_at = now(), updated_at = now() WHERE id = $1",
    )
    .bind(id.as_uuid())
    .bind(runtime_ref)
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("container {id}")));
    }
    Ok(())
}

pub async fn mark_stopped(pool: &PgPool, id: ContainerId) -> Result<()> {
    let affected = sqlx::query(
        "UPDATE containers SET status = 'stopped', last_stopped_at = now(), updated_at = now()
         WHERE id = $1",
    )
    .bind(id.as_uuid())
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("container {id}")));
    }
    Ok(())
}

pub async fn create_snapshot(
    pool: &PgPool,
    container_id: ContainerId,
    parent_id: Option<SnapshotId>,
    label: Option<&str>,
    archive_path: &str,
) -> Result<Snapshot> {
    let id = SnapshotId::new();
    let row = sqlx::query_as::<_, SnapshotRow>(
        "INSERT INTO snapshots (id, container_id, parent_id, label, archive_path)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, container_id, parent_id, label, archive_path, created_at",
    )
    .bind(id.as_uuid())
    .bind(container_id.as_uuid())
    .bind(parent_id.map(|p| p.as_uuid()))
    .bind(label)
    .bind(archive_path)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get_snapshot(pool: &PgPool, id: SnapshotId) -> Result<Snapshot> {
    let row = sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, container_id, parent_id, label, archive_path, created_at
         FROM snapshots WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("snapshot {id}")))?;
    Ok(row.into())
}

pub async fn list_snapshots(pool: &PgPool, container_id: ContainerId) -> Result<Vec<Snapshot>> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, container_id, parent_id, label, archive_path, created_at
         FROM snapshots WHERE container_id = $1 ORDER BY created_at",
    )
    .bind(container_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Rejected with `Conflict` while `id` is still referenced by a
/// `container_versions` row or by another snapshot's `parent_id` — deleting
/// it would break the version history or orphan a child in the DAG. No
/// background GC sweep runs for snapshots that become unreferenced later;
/// an explicit prune operation would need to walk the DAG itself.
pub async fn delete_snapshot(pool: &PgPool, id: SnapshotId) -> Result<()> {
    let referenced_by_version: Option<(i32,)> =
    sqlx::query_as("SELECT 1 FROM container_versions WHERE snapshot_id = $1")
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?;
    if referenced_by_version.is_some() {
        return Err(DbError::Conflict(format!(
                    "snapshot {id} is referenced by a container version"
        )));
    }
    let referenced_by_child: Option<(i32,)> =
    sqlx::query_as("SELECT 1 FROM snapshots WHERE parent_id = $1")
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?;
    if referenced_by_child.is_some() {
        return Err(DbError::Conflict(format!(
                    "snapshot {id} has a child snapshot"
        )));
    }
    let affected = sqlx::query("DELETE FROM snapshots WHERE id = $1")
    .bind(id.as_uuid())
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("snapshot {id}")));
    }
    Ok(())
}

/// Creates the next version number for `container_id` and points it at
/// `snapshot_id`. Version numbers are monotone and never reused — a
/// rollback creates a *new* version referencing an older snapshot rather
/// than rewriting history, so `version_number` always strictly increases.
pub async fn create_version(
    pool: &PgPool,
    container_id: ContainerId,
    snapshot_id: SnapshotId,
    note: Option<&str>,
) -> Result<ContainerVersion> {
    let id = ContainerVersionId::new();
    let row = sqlx::query_as::<_, ContainerVersionRow>(
        "INSERT INTO container_versions (id, container_id, snapshot_id, version_number, note)
         VALUES (
         $1, $2, $3,
         COALESCE((SELECT MAX(version_number) FROM container_versions WHERE container_id = $2), 0) + 1,
         $4
         )
         RETURNING id, container_id, snapshot_id, version_number, note, created_at",
    )
    .bind(id.as_uuid())
    .bind(container_id.as_uuid())
    .bind(snapshot_id.as_uuid())
    .bind(note)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn latest_version(pool: &PgPool, container_id: ContainerId) -> Result<Option<ContainerVersion>> {
    let row = sqlx::query_as::<_, ContainerVersionRow>(
        "SELECT id, container_id, snapshot_id, version_number, note, created_at
         FROM container_versions WHERE container_id = $1
         ORDER BY version_number DESC LIMIT 1",
    )
    .bind(container_id.as_uuid())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

pub async fn list_versions(pool: &PgPool, container_id: ContainerId) -> Result<Vec<ContainerVersion>> {
    let rows = sqlx::query_as::<_, ContainerVersionRow>(
        "SELECT id, container_id, snapshot_id, version_number, note, created_at
         FROM container_versions WHERE container_id = $1 ORDER BY version_number",
    )
    .bind(container_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}
