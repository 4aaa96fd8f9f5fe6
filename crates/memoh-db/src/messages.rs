use memoh_core::types::{BotId, ChannelIdentityId, ChannelName, MessageId, MessageRole, RouteId, UserId};
use serde_json::Value as Json;

use crate::model::{Message, MessageAsset, MessageAssetRow, MessageRow};
use crate::{DbError, PgPool, Result};

#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub route_id: Option<RouteId>,
    pub sender_channel_identity_id: Option<ChannelIdentityId>,
    pub sender_user_id: Option<UserId>,
    pub platform: Option<ChannelName>,
    pub external_message_id: Option<String>,
    pub source_reply_to_message_id: Option<MessageId>,
    pub usage: Option<Json>,
}

/// Inserts a message. When `platform` and `external_message_id` are both
/// present, a prior insert with the same pair is treated as the same
/// message and its existing row is returned instead of erroring — the
/// idempotency key an inbound-webhook retry relies on. When either is
/// missing there is nothing to deduplicate against, so a new row is always
/// inserted (an adapter that can't supply a stable id accepts the
/// at-least-once risk).
pub async fn insert(
    pool: &PgPool,
    bot_id: BotId,
    role: MessageRole,
    content: Json,
    metadata: Json,
    new: NewMessage,
) -> Result<Message> {
    let id = MessageId::new();
    let row = sqlx::query_as::<_, MessageRow>(
        "INSERT INTO messages (id, bot_id, route_id, sender_channel_identity_id, sender_user_id,
         platform, external_message_id, source_reply_to_message_id,
         role, content, metadata, usage)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (bot_id, platform, external_message_id)
         WHERE platform IS NOT NULL AND external_message_id IS NOT NULL
         DO UPDATE SET bot_id = messages.bot_id
         RETURNING id, bot_id, route_id, sender_channel_identity_id, sender_user_id, platform,
         external_message_id, source_reply_to_message_id, role, content, metadata,
         usage, created_at",
    )
    .bind(id.as_uuid())
    .bind(bot_id.as_uuid())
    .bind(new.route_id.map(|r| r.as_uuid()))
    .bind(new.sender_channel_identity_id.map(|c| c.as_uuid()))
    .bind(new.sender_user_id.map(|u| u.as_uuid()))
    .bind(&new.platform)
    .bind(&new.external_message_id)
    .bind(new.source_reply_to_message_id.map(|m| m.as_uuid()))
    .bind(role.to_string())
    .bind(content)
    .bind(metadata)
    .bind(new.usage)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: MessageId) -> Result<Message> {
    let row = sqlx::query_as::<_, MessageRow>(
        "SELECT id, bot_id, route_id, sender_channel_identity_id, sender_user_id, platform,
         external_message_id, source_reply_to_message_id, role, content, metadata,
         usage, created_at
         FROM messages WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("message {id}")))?;
    Ok(row.into())
}

pub async fn list_for_route(pool: &PgPool, route_id: RouteId, limit: i64) -> Result<Vec<Message>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT id, bot_id, route_id, sender_channel_identity_id, sender_user_id, platform,
         external_message_id, source_reply_to_message_id, role, content, metadata,
         usage, created_at
         FROM messages WHERE route_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(route_id.as_uuid())
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().rev().map(Into::into).collect())
}

/// Backs `GET /bots/{id}/messages?limit&before` : newest-first
/// page, optionally bounded above by `before`, returned in chronological
/// order like [`list_for_route`].
pub async fn list_for_bot_page(
    pool: &PgPool,
    bot_id: BotId,
    limit: i64,
    before: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<Vec<Message>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT id, bot_id, route_id, sender_channel_identity_id, sender_user_id, platform,
         external_message_id, source_reply_to_message_id, role, content, metadata,
         usage, created_at
         FROM messages
         WHERE bot_id = $1 AND ($2::timestamptz IS NULL OR created_at < $2)
         ORDER BY created_at DESC LIMIT $3",
    )
    .bind(bot_id.as_uuid())
    .bind(before)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().rev().map(Into::into).collect())
}

pub async fn list_for_bot(pool: &PgPool, bot_id: BotId, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<Message>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT id, bot_id, route_id, sender_channel_identity_id, sender_user_id, platform,
         external_message_id, source_reply_to_message_id, role, content, metadata,
         usage, created_at
         FROM messages WHERE bot_id = $1 AND created_at > $2 ORDER BY created_at",
    )
    .bind(bot_id.as_uuid())
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn add_asset(
    pool: &PgPool,
    message_id: MessageId,
    content_hash: &str,
    mime_type: Option<&str>,
    file_name: Option<&str>,
) -> Result<MessageAsset> {
    let row = sqlx::query_as::<_, MessageAssetRow>(
        "INSERT INTO message_assets (message_id, content_hash, mime_type, file_name)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (message_id, content_hash) DO UPDATE SET mime_type = EXCLUDED.mime_type
         RETURNING message_id, content_hash, mime_type, file_name",
    )
    .bind(message_id.as_uuid())
    .bind(content_hash)
    .bind(mime_type)
    .bind(file_name)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn list_assets(pool: &PgPool, message_id: MessageId) -> Result<Vec<MessageAsset>> {
    let rows = sqlx::query_as::<_, MessageAssetRow>(
        "SELECT message_id, content_hash, mime_type, file_name
         FROM message_assets WHERE message_id = $1",
    )
    .bind(message_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}
