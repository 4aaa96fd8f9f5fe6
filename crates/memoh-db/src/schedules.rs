use chrono::{DateTime, Utc};
use memoh_core::types::{BotId, ScheduleId};
use serde_json::Value as Json;

use crate::model::{Schedule, ScheduleRow};
use crate::{DbError, PgPool, Result};

pub async fn create(
    pool: &PgPool,
    bot_id: BotId,
    name: &str,
    description: Option<&str>,
    cron_pattern: &str,
    command: Json,
    max_calls: Option<i32>,
    next_run_at: Option<DateTime<Utc>>,
) -> Result<Schedule> {
    let id = ScheduleId::new();
    let row = sqlx::query_as::<_, ScheduleRow>(
        "INSERT INTO schedules (id, bot_id, name, description, cron_pattern, command,
         max_calls, next_run_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id, bot_id, name, description, cron_pattern, command, max_calls,
         current_calls, enabled, next_run_at, last_run_at, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(bot_id.as_uuid())
    .bind(name)
    .bind(description)
    .bind(cron_pattern)
    .bind(command)
    .bind(max_calls)
    .bind(next_run_at)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: ScheduleId) -> Result<Schedule> {
    let row = sqlx::query_as::<_, ScheduleRow>(
        "SELECT id, bot_id, name, description, cron_pattern, command, max_calls,
         current_calls, enabled, next_run_at, last_run_at, created_at, updated_at
         FROM schedules WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("schedule {id}")))?;
    Ok(row.into())
}

pub async fn list_for_bot(pool: &PgPool, bot_id: BotId) -> Result<Vec<Schedule>> {
    let rows = sqlx::query_as::<_, ScheduleRow>(
        "SELECT id, bot_id, name, description, cron_pattern, command, max_calls,
         current_calls, enabled, next_run_at, last_run_at, created_at, updated_at
         FROM schedules WHERE bot_id = $1 ORDER BY created_at",
    )
    .bind(bot_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Every enabled schedule, across all bots — the bootstrap-recovery sweep's
/// starting point ("on startup, enumerate all enabled schedules").
pub async fn list_enabled(pool: &PgPool) -> Result<Vec<Schedule>> {
    let rows = sqlx::query_as::<_, ScheduleRow>(
        "SELECT id, bot_id, name, description, cron_pattern, command, max_calls,
         current_calls, enabled, next_run_at, last_run_at, created_at, updated_at
         FROM schedules WHERE enabled ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Schedules due to fire: enabled, `next_run_at` in the past, and (if
/// capped) still under their call ceiling. The bootstrap-recovery sweep and
/// the live poller share this query.
pub async fn list_due(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<Schedule>> {
    let rows = sqlx::query_as::<_, ScheduleRow>(
        "SELECT id, bot_id, name, description, cron_pattern, command, max_calls,
         current_calls, enabled, next_run_at, last_run_at, created_at, updated_at
         FROM schedules
         WHERE enabled AND next_run_at <= $1
         AND (max_calls IS NULL OR current_calls < max_calls)
         ORDER BY next_run_at",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn update(
    pool: &PgPool,
    id: ScheduleId,
    cron_pattern: Option<&str>,
    max_calls: Option<Option<i32>>,
    enabled: Option<bool>,
) -> Result<Schedule> {
    let row = sqlx::query_as::<_, ScheduleRow>(
        "UPDATE schedules SET
         cron_pattern = COALESCE($2, cron_pattern),
         max_calls = COALESCE($3, max_calls),
         enabled = COALESCE($4, enabled),
         updated_at = now()
         WHERE id = $1
         RETURNING id, bot_id, name, description, cron_pattern, command, max_calls,
         current_calls, enabled, next_run_at, last_run_at, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(cron_pattern)
    .bind(max_calls.flatten())
    .bind(enabled)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("schedule {id}")))?;
    Ok(row.into())
}

/// Atomically records a firing: bumps `current_calls`, stamps `last_run_at`,
/// and advances `next_run_at` to the caller-computed next occurrence. Done
/// in one statement so two racing scheduler instances can't both increment
/// past `max_calls`.
pub async fn record_run(
    pool: &PgPool,
    id: ScheduleId,
    ran_at: DateTime<Utc>,
    next_run_at: Option<DateTime<Utc>>,
) -> Result<Schedule> {
    let row = sqlx::query_as::<_, ScheduleRow>(
        "UPDATE schedules SET
         current_calls = current_calls + 1,
         last_run_at = $2,
         next_run_at = $3,
         updated_at = now()
         WHERE id = $1
         RETURNING id, bot_id, name, description, cron_pattern, command, max_calls,
         current_calls, enabled, next_run_at, last_run_at, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(ran_at)
    .bind(next_run_at)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("schedule {id}")))?;
    Ok(row.into())
}

pub async fn delete(pool: &PgPool, id: ScheduleId) -> Result<()> {
    let affected = sqlx::query("DELETE FROM schedules WHERE id = $1")
    .bind(id.as_uuid())
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("schedule {id}")));
    }
    Ok(())
}
