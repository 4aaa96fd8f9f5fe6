use memoh_core::types::{BotId, ChannelName, ConversationId, RouteId};

use crate::model::{Route, RouteRow};
use crate::{DbError, PgPool, Result};

/// Looks up the route for `(bot, channel, external_conversation_id, thread_id)`,
/// creating a new conversation + route on first contact. `thread_id = None`
/// and `thread_id = Some("")` resolve to the same route — the lookup index
/// coalesces both to `''` (see migration 0005) so a channel's "no thread"
/// sentinel never silently forks into a second route.
pub async fn find_or_create(
    pool: &PgPool,
    bot_id: BotId,
    channel: &ChannelName,
    external_conversation_id: &str,
    thread_id: Option<&str>,
    new_conversation_id: ConversationId,
) -> Result<Route> {
    if let Some(existing) =
    find(pool, bot_id, channel, external_conversation_id, thread_id).await?
    {
        return Ok(existing);
    }
    let id = RouteId::new();
    let row = sqlx::query_as::<_, RouteRow>(
        "INSERT INTO routes (id, conversation_id, bot_id, channel, external_conversation_id, thread_id)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (bot_id, channel, external_conversation_id, (COALESCE(thread_id, '')))
         DO UPDATE SET updated_at = routes.updated_at
         RETURNING id, conversation_id, bot_id, channel, channel_config_id,
         external_conversation_id, thread_id, conversation_type, reply_target,
         metadata, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(new_conversation_id.as_uuid())
    .bind(bot_id.as_uuid())
    .bind(channel)
    .bind(external_conversation_id)
    .bind(thread_id)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn find(
    pool: &PgPool,
    bot_id: BotId,
    channel: &ChannelName,
    external_conversation_id: &str,
    thread_id: Option<&str>,
) -> Result<Option<Route>> {
    let row = sqlx::query_as::<_, RouteRow>(
        "SELECT id, conversation_id, bot_id, channel, channel_config_id,
         external_conversation_id, thread_id, conversation_type, reply_target,
         metadata, created_at, updated_at
         FROM routes
         WHERE bot_id = $1 AND channel = $2 AND external_conversation_id = $3
         AND COALESCE(thread_id, '') = COALESCE($4, '')",
    )
    .bind(bot_id.as_uuid())
    .bind(channel)
    .bind(external_conversation_id)
    .bind(thread_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

pub async fn get(pool: &PgPool, id: RouteId) -> Result<Route> {
    let row = sqlx::query_as::<_, RouteRow>(
        "SELECT id, conversation_id, bot_id, channel, channel_config_id,
         external_conversation_id, thread_id, conversation_type, reply_target,
         metadata, created_at, updated_at
         FROM routes WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("route {id}")))?;
    Ok(row.into())
}

pub async fn set_reply_target(pool: &PgPool, id: RouteId, reply_target: &str) -> Result<()> {
    let affected = sqlx::query(
        "UPDATE routes SET reply_target = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id.as_uuid())
    .bind(reply_target)
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("route {id}")));
    }
    Ok(())
}
