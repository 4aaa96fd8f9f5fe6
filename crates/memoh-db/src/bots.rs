use memoh_core::types::{BotId, BotType, UserId};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::model::{bot_type_str, Bot, BotRow};
use crate::{DbError, PgPool, Result};

pub async fn create(
    pool: &PgPool,
    owner_user_id: UserId,
    bot_type: BotType,
    display_name: &str,
    max_context_tokens: i32,
) -> Result<Bot> {
    let id = BotId::new();
    let row = sqlx::query_as::<_, BotRow>(
        "INSERT INTO bots (id, owner_user_id, bot_type, display_name, max_context_tokens)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, owner_user_id, bot_type, display_name, avatar_url, is_active,
         metadata, max_context_tokens, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(owner_user_id.as_uuid())
    .bind(bot_type_str(bot_type))
    .bind(display_name)
    .bind(max_context_tokens)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: BotId) -> Result<Bot> {
    let row = sqlx::query_as::<_, BotRow>(
        "SELECT id, owner_user_id, bot_type, display_name, avatar_url, is_active,
         metadata, max_context_tokens, created_at, updated_at
         FROM bots WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("bot {id}")))?;
    Ok(row.into())
}

pub async fn list_by_owner(pool: &PgPool, owner_user_id: UserId) -> Result<Vec<Bot>> {
    let rows = sqlx::query_as::<_, BotRow>(
        "SELECT id, owner_user_id, bot_type, display_name, avatar_url, is_active,
         metadata, max_context_tokens, created_at, updated_at
         FROM bots WHERE owner_user_id = $1 ORDER BY created_at",
    )
    .bind(owner_user_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn list_public(pool: &PgPool) -> Result<Vec<Bot>> {
    let rows = sqlx::query_as::<_, BotRow>(
        "SELECT id, owner_user_id, bot_type, display_name, avatar_url, is_active,
         metadata, max_context_tokens, created_at, updated_at
         FROM bots WHERE bot_type = 'public' AND is_active ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn update_settings(
    pool: &PgPool,
    id: BotId,
    display_name: Option<&str>,
    avatar_url: Option<&str>,
    max_context_tokens: Option<i32>,
    metadata: Option<Json>,
) -> Result<Bot> {
    let row = sqlx::query_as::<_, BotRow>(
        "UPDATE bots SET
         display_name = COALESCE($2, display_name),
         avatar_url = COALESCE($3, avatar_url),
         max_context_tokens = COALESCE($4, max_context_tokens),
         metadata = COALESCE($5, metadata),
         updated_at = now()
         WHERE id = $1
         RETURNING id, owner_user_id, bot_type, display_name, avatar_url, is_active,
         metadata, max_context_tokens, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(display_name)
    .bind(avatar_url)
    .bind(max_context_tokens)
    .bind(metadata)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("bot {id}")))?;
    Ok(row.into())
}

/// Hard delete; every downstream table (the design: "deletion cascades") references
/// `bots(id)` with `ON DELETE CASCADE`, so this one statement is enough.
pub async fn delete(pool: &PgPool, id: BotId) -> Result<()> {
    let affected = sqlx::query("DELETE FROM bots WHERE id = $1")
    .bind(id.as_uuid())
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("bot {id}")));
    }
    Ok(())
}

pub async fn set_active(pool: &PgPool, id: BotId, is_active: bool) -> Result<()> {
    let affected = sqlx::query("UPDATE bots SET is_active = $2, updated_at = now() WHERE id = $1")
    .bind(id.as_uuid())
    .bind(is_active)
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("bot {id}")));
    }
    Ok(())
}

/// Links a model onto a bot. `enable_as` is denormalised here (see migration
/// 0002) so the caller is responsible for clearing any previous holder of
/// the same `enable_as` slot before calling this with `Some(..)`.
pub async fn link_model(
    pool: &PgPool,
    bot_id: BotId,
    model_id: memoh_core::types::ModelId,
    enable_as: Option<memoh_core::types::EnableAs>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO bot_models (bot_id, model_id, enable_as) VALUES ($1, $2, $3)
         ON CONFLICT (bot_id, model_id) DO UPDATE SET enable_as = EXCLUDED.enable_as",
    )
    .bind(bot_id.as_uuid())
    .bind(model_id.as_uuid())
    .bind(enable_as.map(crate::model::enable_as_str))
    .execute(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(())
}

pub async fn clear_enable_as(
    pool: &PgPool,
    bot_id: BotId,
    enable_as: memoh_core::types::EnableAs,
) -> Result<()> {
    sqlx::query("UPDATE bot_models SET enable_as = NULL WHERE bot_id = $1 AND enable_as = $2")
    .bind(bot_id.as_uuid())
    .bind(crate::model::enable_as_str(enable_as))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn model_enabled_as(
    pool: &PgPool,
    bot_id: BotId,
    enable_as: memoh_core::types::EnableAs,
) -> Result<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT model_id FROM bot_models WHERE bot_id = $1 AND enable_as = $2",
    )
    .bind(bot_id.as_uuid())
    .bind(crate::model::enable_as_str(enable_as))
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(id,)| id))
}
