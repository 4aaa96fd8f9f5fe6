//! Per-bot container lifecycle : `Create`/`Start`/`Stop`/`Exec`/
//! `Snapshot`/`Rollback`. The snapshot DAG and `ContainerVersion` monotone
//! numbering live entirely in `memoh_db::containers` — this module only
//! drives the runtime side effects (`ContainerRuntime`) and keeps
//! `memoh-db` rows in sync with them.

use std::sync::Arc;
use std::time::Duration;

use memoh_core::types::{BotId, SnapshotId};
use memoh_db::model::{Container, ContainerStatus, ContainerVersion, Snapshot};
use memoh_db::PgPool;

use crate::error::{ContainerError, Result};
use crate::runtime::{ContainerRuntime, ExecRequest, ExecResult};

/// Default grace period between SIGTERM and SIGKILL on `Stop`.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// Parameters for `Create` beyond the image — presently just the host-side
/// bind mount root; kept as its own struct so future per-bot resource limits
/// (memory/cpu shares, network mode) have a natural home without changing
/// every call site.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub host_path: String,
}

pub struct ContainerService {
    pool: PgPool,
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerService {
    pub fn new(pool: PgPool, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { pool, runtime }
    }

    /// Pulls `image` if absent, creates the container with a bind mount at
    /// `/data`, and records it. Does not start it — callers invoke `start`
    /// separately, matching create/start split in
    /// `sandbox.rs`'s `run_in_sandbox`.
    pub async fn create(&self, bot_id: BotId, image: &str, spec: ContainerSpec) -> Result<Container> {
        if memoh_db::containers::get_for_bot(&self.pool, bot_id)
        .await?
        .is_some()
        {
            return Err(ContainerError::Conflict(format!(
                        "bot {bot_id} already has a container"
            )));
        }
        let container = memoh_db::containers::create(&self.pool, bot_id, image, &spec.host_path).await?;
        let name = format!("memoh-{}", container.id);
        let runtime_ref = self.runtime.create(&name, image, &spec.host_path).await?;
        memoh_db::containers::set_status(
            &self.pool,
            container.id,
            ContainerStatus::Stopped,
            Some(&runtime_ref),
        )
        .await?;
        memoh_db::containers::get(&self.pool, container.id).await.map_err(Into::into)
    }

    /// Idempotent: starting an already-running container just refreshes
    /// `last_started_at`.
    pub async fn start(&self, bot_id: BotId) -> Result<Container> {
        let container = self.container_for_bot(bot_id).await?;
        let runtime_ref = container
        .runtime_ref
        .as_deref()
        .ok_or_else(|| ContainerError::Conflict(format!("container {} has no runtime handle", container.id)))?;
        self.runtime.start(runtime_ref).await?;
        memoh_db::containers::mark_started(&self.pool, container.id, None).await?;
        memoh_db::containers::get(&self.pool, container.id).await.map_err(Into::into)
    }

    /// SIGTERM, then SIGKILL after `grace`.
    pub async fn stop(&self, bot_id: BotId, grace: Duration) -> Result<Container> {
        let container = self.container_for_bot(bot_id).await?;
        if let Some(runtime_ref) = container.runtime_ref.as_deref() {
            self.runtime.stop(runtime_ref, grace).await?;
        }
        memoh_db::containers::mark_stopped(&self.pool, container.id).await?;
        memoh_db::containers::get(&self.pool, container.id).await.map_err(Into::into)
    }

    /// Runs `req` inside the bot's container. `req.mode` selects whether
    /// the result is a fully-buffered [`crate::runtime::ExecOutcome`] or a
    /// live [`crate::runtime::ExecStream`] of incremental output.
    pub async fn exec(&self, bot_id: BotId, req: ExecRequest) -> Result<ExecResult> {
        let container = self.container_for_bot(bot_id).await?;
        let runtime_ref = container
        .runtime_ref
        .as_deref()
        .ok_or_else(|| ContainerError::Conflict(format!("container {} has no runtime handle", container.id)))?;
        if container.status != ContainerStatus::Running {
            return Err(ContainerError::Conflict(format!(
                        "container {} is not running",
                        container.id
            )));
        }
        self.runtime.exec(runtime_ref, req).await
    }

    /// Commits the container's current filesystem on top of `parent` (or the
    /// latest existing snapshot, or the image if there is none yet), records
    /// the snapshot in the DAG, then creates the next monotone
    /// `ContainerVersion`.
    pub async fn snapshot(
        &self,
        bot_id: BotId,
        parent: Option<SnapshotId>,
        label: Option<&str>,
    ) -> Result<(Snapshot, ContainerVersion)> {
        let container = self.container_for_bot(bot_id).await?;
        let runtime_ref = container
        .runtime_ref
        .as_deref()
        .ok_or_else(|| ContainerError::Conflict(format!("container {} has no runtime handle", container.id)))?;

        let parent = match parent {
            Some(p) => Some(p),
            None => memoh_db::containers::latest_version(&self.pool, container.id)
            .await?
            .map(|v| v.snapshot_id),
        };

        let tag = format!(
            "memoh-snapshot/{}:{}",
            container.id,
            uuid::Uuid::new_v4()
        );
        self.runtime.commit(runtime_ref, &tag).await?;

        let snapshot = memoh_db::containers::create_snapshot(
            &self.pool,
            container.id,
            parent,
            label,
            &tag,
        )
        .await?;
        let version = memoh_db::containers::create_version(&self.pool, container.id, snapshot.id, label).await?;
        Ok((snapshot, version))
    }

    /// Finds the snapshot behind `version`, stops the current task, and
    /// starts a fresh one over that snapshot's image tag.
    pub async fn rollback(&self, bot_id: BotId, version_number: i32) -> Result<Container> {
        let container = self.container_for_bot(bot_id).await?;
        let versions = memoh_db::containers::list_versions(&self.pool, container.id).await?;
        let target = versions
        .into_iter()
        .find(|v| v.version_number == version_number)
        .ok_or_else(|| ContainerError::NotFound(format!("version {version_number} on container {}", container.id)))?;
        let snapshot = memoh_db::containers::get_snapshot(&self.pool, target.snapshot_id).await?;

        if let Some(runtime_ref) = container.runtime_ref.as_deref() {
            self.runtime.stop(runtime_ref, DEFAULT_STOP_GRACE).await?;
            self.runtime.remove(runtime_ref).await?;
        }

        let name = format!("memoh-{}-v{}", container.id, version_number);
        let runtime_ref = self
        .runtime
        .run_from_snapshot(&name, &snapshot.archive_path, &container.host_path)
        .await?;
        self.runtime.start(&runtime_ref).await?;
        memoh_db::containers::mark_started(&self.pool, container.id, Some(&runtime_ref)).await?;
        memoh_db::containers::get(&self.pool, container.id).await.map_err(Into::into)
    }

    async fn container_for_bot(&self, bot_id: BotId) -> Result<Container> {
        memoh_db::containers::get_for_bot(&self.pool, bot_id)
        .await?
        .ok_or_else(|| ContainerError::NotFound(format!("no container for bot {bot_id}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
