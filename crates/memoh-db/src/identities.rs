use memoh_core::types::{ChannelIdentityId, ChannelName, UserId};

use crate::model::{ChannelIdentity, ChannelIdentityRow};
use crate::{DbError, PgPool, Result};

/// Resolves `(channel, channel_subject_id)` to its identity row, creating
/// one (unlinked — `user_id = NULL`) if this is the first time we've seen
/// this external account. Mirrors the router's identity-resolution step:
/// the same external account always maps to the same `ChannelIdentityId`.
pub async fn resolve_or_create(
    pool: &PgPool,
    channel: &ChannelName,
    channel_subject_id: &str,
    display_name: Option<&str>,
) -> Result<ChannelIdentity> {
    if let Some(existing) = find(pool, channel, channel_subject_id).await? {
        return Ok(existing);
    }
    let id = ChannelIdentityId::new();
    let row = sqlx::query_as::<_, ChannelIdentityRow>(
        "INSERT INTO channel_identities (id, channel, channel_subject_id, display_name)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (channel, channel_subject_id) DO UPDATE SET channel = EXCLUDED.channel
         RETURNING id, user_id, channel, channel_subject_id, display_name, avatar_url,
         metadata, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(channel)
    .bind(channel_subject_id)
    .bind(display_name)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn find(
    pool: &PgPool,
    channel: &ChannelName,
    channel_subject_id: &str,
) -> Result<Option<ChannelIdentity>> {
    let row = sqlx::query_as::<_, ChannelIdentityRow>(
        "SELECT id, user_id, channel, channel_subject_id, display_name, avatar_url,
         metadata, created_at, updated_at
         FROM channel_identities WHERE channel = $1 AND channel_subject_id = $2",
    )
    .bind(channel)
    .bind(channel_subject_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

pub async fn get(pool: &PgPool, id: ChannelIdentityId) -> Result<ChannelIdentity> {
    let row = sqlx::query_as::<_, ChannelIdentityRow>(
        "SELECT id, user_id, channel, channel_subject_id, display_name, avatar_url,
         metadata, created_at, updated_at
         FROM channel_identities WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("channel identity {id}")))?;
    Ok(row.into())
}

/// Links a resolved `UserId` onto an identity (e.g. after `/auth/login`
/// ties a channel account to a platform account). Idempotent.
pub async fn link_user(pool: &PgPool, id: ChannelIdentityId, user_id: UserId) -> Result<()> {
    let affected = sqlx::query(
        "UPDATE channel_identities SET user_id = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id.as_uuid())
    .bind(user_id.as_uuid())
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("channel identity {id}")));
    }
    Ok(())
}

/// Every channel identity linked to `user_id` — the access-resolution seam
/// a user's `AccessMode` for a conversation is derived from
/// which of these identities, if any, are participants or senders there.
pub async fn list_for_user(pool: &PgPool, user_id: UserId) -> Result<Vec<ChannelIdentity>> {
    let rows = sqlx::query_as::<_, ChannelIdentityRow>(
        "SELECT id, user_id, channel, channel_subject_id, display_name, avatar_url,
         metadata, created_at, updated_at
         FROM channel_identities WHERE user_id = $1",
    )
    .bind(user_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn update_profile(
    pool: &PgPool,
    id: ChannelIdentityId,
    display_name: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<ChannelIdentity> {
    let row = sqlx::query_as::<_, ChannelIdentityRow>(
        "UPDATE channel_identities SET
         display_name = COALESCE($2, display_name),
         avatar_url = COALESCE($3, avatar_url),
         updated_at = now()
         WHERE id = $1
         RETURNING id, user_id, channel, channel_subject_id, display_name, avatar_url,
         metadata, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(display_name)
    .bind(avatar_url)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("channel identity {id}")))?;
    Ok(row.into())
}
