use memoh_core::types::{BotId, ModelId, SubagentId};
use serde_json::Value as Json;

use crate::model::{Subagent, SubagentRow};
use crate::{DbError, PgPool, Result};

const COLUMNS: &str = "id, bot_id, name, description, allowed_actions, system_prompt, model_id,
         created_at, updated_at, deleted_at";

pub async fn create(
    pool: &PgPool,
    bot_id: BotId,
    name: &str,
    description: Option<&str>,
    allowed_actions: Json,
    system_prompt: Option<&str>,
    model_id: Option<ModelId>,
) -> Result<Subagent> {
    let id = SubagentId::new();
    let row = sqlx::query_as::<_, SubagentRow>(&format!(
            "INSERT INTO subagents (id, bot_id, name, description, allowed_actions, system_prompt, model_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {COLUMNS}"
    ))
    .bind(id.as_uuid())
    .bind(bot_id.as_uuid())
    .bind(name)
    .bind(description)
    .bind(allowed_actions)
    .bind(system_prompt)
    .bind(model_id.map(|m| m.as_uuid()))
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: SubagentId) -> Result<Subagent> {
    let row = sqlx::query_as::<_, SubagentRow>(&format!(
            "SELECT {COLUMNS} FROM subagents WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("subagent {id}")))?;
    Ok(row.into())
}

pub async fn list_for_bot(pool: &PgPool, bot_id: BotId) -> Result<Vec<Subagent>> {
    let rows = sqlx::query_as::<_, SubagentRow>(&format!(
            "SELECT {COLUMNS} FROM subagents WHERE bot_id = $1 AND deleted_at IS NULL ORDER BY created_at"
    ))
    .bind(bot_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn update(
    pool: &PgPool,
    id: SubagentId,
    description: Option<&str>,
    allowed_actions: Option<Json>,
    system_prompt: Option<&str>,
) -> Result<Subagent> {
    let row = sqlx::query_as::<_, SubagentRow>(&format!(
            "UPDATE subagents SET
         description = COALESCE($2, description),
         allowed_actions = COALESCE($3, allowed_actions),
         system_prompt = COALESCE($4, system_prompt),
         updated_at = now()
         WHERE id = $1 AND deleted_at IS NULL
         RETURNING {COLUMNS}"
    ))
    .bind(id.as_uuid())
    .bind(description)
    .bind(allowed_actions)
    .bind(system_prompt)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("subagent {id}")))?;
    Ok(row.into())
}

/// Soft-delete: the only entity in the data model that isn't hard-deleted
/// (a `deleted_at` column, owned entirely by this tool family).
pub async fn delete(pool: &PgPool, id: SubagentId) -> Result<()> {
    let affected = sqlx::query(
        "UPDATE subagents SET deleted_at = now(), updated_at = now()
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id.as_uuid())
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("subagent {id}")));
    }
    Ok(())
}
