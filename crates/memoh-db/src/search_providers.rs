//! Backing store for `/search-providers`, consumed by
//! `memoh-mcp`'s `web.search` tool via the gateway's `HttpSearchProvider`
//! adapter. Same create/get/list/update/delete shape as `subagents.rs`,
//! minus the soft-delete column — ordinary bots-owned config, not an
//! entity with its own lifecycle invariants.

use memoh_core::types::{BotId, SearchProviderId};

use crate::model::{SearchProvider, SearchProviderRow};
use crate::{DbError, PgPool, Result};

const COLUMNS: &str = "id, bot_id, name, endpoint, api_key, created_at, updated_at";

pub async fn create(
    pool: &PgPool,
    bot_id: BotId,
    name: &str,
    endpoint: &str,
    api_key: Option<&str>,
) -> Result<SearchProvider> {
    let id = SearchProviderId::new();
    let row = sqlx::query_as::<_, SearchProviderRow>(&format!(
            "INSERT INTO search_providers (id, bot_id, name, endpoint, api_key)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {COLUMNS}"
    ))
    .bind(id.as_uuid())
    .bind(bot_id.as_uuid())
    .bind(name)
    .bind(endpoint)
    .bind(api_key)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: SearchProviderId) -> Result<SearchProvider> {
    let row = sqlx::query_as::<_, SearchProviderRow>(&format!(
            "SELECT {COLUMNS} FROM search_providers WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("search provider {id}")))?;
    Ok(row.into())
}

pub async fn list_for_bot(pool: &PgPool, bot_id: BotId) -> Result<Vec<SearchProvider>> {
    let rows = sqlx::query_as::<_, SearchProviderRow>(&format!(
            "SELECT {COLUMNS} FROM search_providers WHERE bot_id = $1 ORDER BY name"
    ))
    .bind(bot_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn update(
    pool: &PgPool,
    id: SearchProviderId,
    endpoint: Option<&str>,
    api_key: Option<Option<&str>>,
) -> Result<SearchProvider> {
    let row = sqlx::query_as::<_, SearchProviderRow>(&format!(
            "UPDATE search_providers SET
         endpoint = COALESCE($2, endpoint),
         api_key = COALESCE($3, api_key),
         updated_at = now()
         WHERE id = $1
         RETURNING {COLUMNS}"
    ))
    .bind(id.as_uuid())
    .bind(endpoint)
    .bind(api_key.unwrap_or(None))
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("search provider {id}")))?;
    Ok(row.into())
}

pub async fn delete(pool: &PgPool, id: SearchProviderId) -> Result<()> {
    let affected = sqlx::query("DELETE FROM search_providers WHERE id = $1")
    .bind(id.as_uuid())
    .execute(pool)
    .await
    .map_err(DbError::from_write)?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("search provider {id}")));
    }
    Ok(())
}
