use memoh_core::types::{ClientType, LlmProviderId, Modality, ModelId, ModelKind};

use crate::model::{client_type_str, model_kind_str, LlmProvider, LlmProviderRow, Model, ModelRow};
use crate::{DbError, PgPool, Result};

pub async fn create_provider(
    pool: &PgPool,
    name: &str,
    base_url: &str,
    api_key: &str,
) -> Result<LlmProvider> {
    let id = LlmProviderId::new();
    let row = sqlx::query_as::<_, LlmProviderRow>(
        "INSERT INTO llm_providers (id, name, base_url, api_key)
         VALUES ($1, $2, $3, $4)
         RETURNING id, name, base_url, api_key, metadata, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(name)
    .bind(base_url)
    .bind(api_key)
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get_provider(pool: &PgPool, id: LlmProviderId) -> Result<LlmProvider> {
    let row = sqlx::query_as::<_, LlmProviderRow>(
        "SELECT id, name, base_url, api_key, metadata, created_at, updated_at
         FROM llm_providers WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("llm provider {id}")))?;
    Ok(row.into())
}

pub async fn list_providers(pool: &PgPool) -> Result<Vec<LlmProvider>> {
    let rows = sqlx::query_as::<_, LlmProviderRow>(
        "SELECT id, name, base_url, api_key, metadata, created_at, updated_at
         FROM llm_providers ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn delete_provider(pool: &PgPool, id: LlmProviderId) -> Result<()> {
    let affected = sqlx::query("DELETE FROM llm_providers WHERE id = $1")
    .bind(id.as_uuid())
    .execute(pool)
    .await
    .map_err(DbError::from_write)?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("llm provider {id}")));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn create_model(
    pool: &PgPool,
    provider_id: LlmProviderId,
    model_id: &str,
    name: Option<&str>,
    input_modalities: &[Modality],
    model_kind: ModelKind,
    dimensions: Option<i32>,
    client_type: Option<ClientType>,
) -> Result<Model> {
    let id = ModelId::new();
    let modalities: Vec<&str> = input_modalities
    .iter()
    .map(|m| match m {
            Modality::Text => "text",
            Modality::Image => "image",
    })
    .collect();
    let row = sqlx::query_as::<_, ModelRow>(
        "INSERT INTO models (id, model_id, name, provider_id, input_modalities, model_kind,
         dimensions, client_type)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id, model_id, name, provider_id, input_modalities, model_kind,
         dimensions, client_type, created_at, updated_at",
    )
    .bind(id.as_uuid())
    .bind(model_id)
    .bind(name)
    .bind(provider_id.as_uuid())
    .bind(&modalities)
    .bind(model_kind_str(model_kind))
    .bind(dimensions)
    .bind(client_type.map(client_type_str))
    .fetch_one(pool)
    .await
    .map_err(DbError::from_write)?;
    Ok(row.into())
}

pub async fn get_model(pool: &PgPool, id: ModelId) -> Result<Model> {
    let row = sqlx::query_as::<_, ModelRow>(
        "SELECT id, model_id, name, provider_id, input_modalities, model_kind,
         dimensions, client_type, created_at, updated_at
         FROM models WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::NotFound(format!("model {id}")))?;
    Ok(row.into())
}

pub async fn list_models_for_provider(
    pool: &PgPool,
    provider_id: LlmProviderId,
) -> Result<Vec<Model>> {
    let rows = sqlx::query_as::<_, ModelRow>(
        "SELECT id, model_id, name, provider_id, input_modalities, model_kind,
         dimensions, client_type, created_at, updated_at
         FROM models WHERE provider_id = $1 ORDER BY model_id",
    )
    .bind(provider_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn list_models_for_bot(pool: &PgPool, bot_id: memoh_core::types::BotId) -> Result<Vec<Model>> {
    let rows = sqlx::query_as::<_, ModelRow>(
        "SELECT m.id, m.model_id, m.name, m.provider_id, m.input_modalities, m.model_kind,
         m.dimensions, m.client_type, m.created_at, m.updated_at
         FROM models m
         JOIN bot_models bm ON bm.model_id = m.id
         WHERE bm.bot_id = $1
         ORDER BY m.model_id",
    )
    .bind(bot_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn delete_model(pool: &PgPool, id: ModelId) -> Result<()> {
    let affected = sqlx::query("DELETE FROM models WHERE id = $1")
    .bind(id.as_uuid())
    .execute(pool)
    .await
    .map_err(DbError::from_write)?
    .rows_affected();
    if affected == 0 {
        return Err(DbError::NotFound(format!("model {id}")));
    }
    Ok(())
}
