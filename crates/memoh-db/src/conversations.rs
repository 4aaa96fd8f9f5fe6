use memoh_core::types::{BotId, ChannelIdentityId, ConversationId, ParticipantRole, UserId};

use crate::model::{
    participant_role_str, Conversation, ConversationKindCol, ConversationRow, Participant,
    ParticipantRow,
};
use crate::{DbError, PgPool, Result};

pub async fn create(
    pool: &PgPool,
    bot_id: BotId,
    kind: ConversationKindCol,
    parent_conversation_id: Option<ConversationId>,
    title: Option<&str>,
    created_by: UserId,
) -> Result<Conversation> {
    let id = ConversationId::new();
    let row = sqlx::query_as::<_, ConversationRow>(
        "INSERT INTO conversations (id, bot_id, kind, parent_conversation_id, title, created_by)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id, bot_id, kind, parent_conversation_id, title, created_by,
         metadata, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(bot_id.as_uuid())
    .bind(kind.as_str())
    .bind(parent_conversation_id.map(|p| p.as_uuid()))
    .bind(title)
    .bind(created_by.as_uuid())
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: ConversationId) -> Result<Conversation> {
    let row = sqlx::query_as::<_, ConversationRow>(
        "SELECT id, bot_id, kind, parent_conversation_id, title, created_by,
         metadata, created_at, updated_at
         FROM conversations WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("conversation {id}")))?;
    Ok(row.into())
}

pub async fn list_threads(pool: &PgPool, parent_conversation_id: ConversationId) -> Result<Vec<Conversation>> {
    let rows = sqlx::query_as::<_, ConversationRow>(
        "SELECT id, bot_id, kind, parent_conversation_id, title, created_by,
         metadata, created_at, updated_at
         FROM conversations WHERE parent_conversation_id = $1 ORDER BY created_at",
    )
    .bind(parent_conversation_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn add_participant(
    pool: &PgPool,
    conversation_id: ConversationId,
    channel_identity_id: ChannelIdentityId,
    role: ParticipantRole,
) -> Result<Participant> {
    let row = sqlx::query_as::<_, ParticipantRow>(
        "INSERT INTO participants (conversation_id, channel_identity_id, role)
         VALUES ($1, $2, $3)
         ON CONFLICT (conversation_id, channel_identity_id) DO UPDATE SET role = EXCLUDED.role
         RETURNING conversation_id, channel_identity_id, role, joined_at",
    )
    .bind(conversation_id.as_uuid())
    .bind(channel_identity_id.as_uuid())
    .bind(participant_role_str(role))
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn list_participants(pool: &PgPool, conversation_id: ConversationId) -> Result<Vec<Participant>> {
    let rows = sqlx::query_as::<_, ParticipantRow>(
        "SELECT conversation_id, channel_identity_id, role, joined_at
         FROM participants WHERE conversation_id = $1",
    )
    .bind(conversation_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// True if `channel_identity_id` has ever sent a message routed into
/// `conversation_id` — the "observed access" check: a non-participant
/// who shares traffic history with a conversation still gets read-only
/// visibility.
pub async fn has_sent_in_conversation(
    pool: &PgPool,
    conversation_id: ConversationId,
    channel_identity_id: ChannelIdentityId,
) -> Result<bool> {
    let row: Option<(i32,)> = sqlx::query_as(
        "SELECT 1 FROM messages m
         JOIN routes r ON r.id = m.route_id
         WHERE r.conversation_id = $1 AND m.sender_channel_identity_id = $2
         LIMIT 1",
    )
    .bind(conversation_id.as_uuid())
    .bind(channel_identity_id.as_uuid())
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

pub async fn is_participant(
    pool: &PgPool,
    conversation_id: ConversationId,
    channel_identity_id: ChannelIdentityId,
) -> Result<bool> {
    let row: Option<(i32,)> = sqlx::query_as(
        "SELECT 1 FROM participants WHERE conversation_id = $1 AND channel_identity_id = $2",
    )
    .bind(conversation_id.as_uuid())
    .bind(channel_identity_id.as_uuid())
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}
