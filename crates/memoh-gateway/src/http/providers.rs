//! `/providers` and `/models` CRUD. `LlmProvider` credentials are
//! stored opaquely : this handler accepts and returns `api_key` as an
//! opaque string, same as `memoh-db::providers` does — no masking layer
//! is part of this API surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use memoh_core::types::{BotId, ClientType, LlmProviderId, Modality, ModelId, ModelKind};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::{require_user, ApiError, AppState};

fn provider_json(p: &memoh_db::model::LlmProvider) -> Value {
    json!({
            "id": p.id.to_string(),
            "name": p.name,
            "base_url": p.base_url,
            "api_key": p.api_key,
            "metadata": p.metadata,
            "created_at": p.created_at,
            "updated_at": p.updated_at,
    })
}

fn model_json(m: &memoh_db::model::Model) -> Value {
    json!({
            "id": m.id.to_string(),
            "model_id": m.model_id,
            "name": m.name,
            "provider_id": m.provider_id.to_string(),
            "input_modalities": m.input_modalities,
            "type": m.model_kind,
            "dimensions": m.dimensions,
            "client_type": m.client_type,
            "created_at": m.created_at,
            "updated_at": m.updated_at,
    })
}

#[derive(Deserialize)]
pub struct CreateProviderRequest {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
}

async fn create_provider_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateProviderRequest>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let provider = memoh_db::providers::create_provider(&state.pool, &req.name, &req.base_url, &req.api_key)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(provider_json(&provider)))
}

async fn list_providers_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let providers = memoh_db::providers::list_providers(&state.pool)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(json!({ "items": providers.iter().map(provider_json).collect::<Vec<_>>() })))
}

async fn get_provider_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<LlmProviderId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let provider = memoh_db::providers::get_provider(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(provider_json(&provider)))
}

async fn delete_provider_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<LlmProviderId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    memoh_db::providers::delete_provider(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct CreateModelRequest {
    pub provider_id: LlmProviderId,
    pub model_id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub input_modalities: Vec<Modality>,
    #[serde(rename = "type")]
    pub model_kind: ModelKind,
    pub dimensions: Option<i32>,
    pub client_type: Option<ClientType>,
}

/// Enforces its "`type=chat` implies `client_type≠∅`" invariant — the
/// database has no CHECK constraint tying the two together, so the gateway
/// is the one place this gets validated before the insert.
async fn create_model_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateModelRequest>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    if req.model_kind == ModelKind::Chat && req.client_type.is_none() {
        return Err(ApiError::from(memoh_core::MemohError::Validation(
                    "chat models require a client_type".to_string(),
        )));
    }
    if req.model_kind == ModelKind::Embedding && req.dimensions.is_none() {
        return Err(ApiError::from(memoh_core::MemohError::Validation(
                    "embedding models require dimensions".to_string(),
        )));
    }
    let model = memoh_db::providers::create_model(
        &state.pool,
        req.provider_id,
        &req.model_id,
        req.name.as_deref(),
        &req.input_modalities,
        req.model_kind,
        req.dimensions,
        req.client_type,
    )
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(model_json(&model)))
}

#[derive(Deserialize)]
pub struct ListModelsQuery {
    pub provider_id: Option<LlmProviderId>,
    pub bot_id: Option<BotId>,
}

async fn list_models_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::extract::Query(query): axum::extract::Query<ListModelsQuery>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let models = if let Some(bot_id) = query.bot_id {
        memoh_db::providers::list_models_for_bot(&state.pool, bot_id).await
    } else if let Some(provider_id) = query.provider_id {
        memoh_db::providers::list_models_for_provider(&state.pool, provider_id).await
    } else {
        return Err(ApiError::from(memoh_core::MemohError::Validation(
                    "one of provider_id or bot_id is required".to_string(),
        )));
    }
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(json!({ "items": models.iter().map(model_json).collect::<Vec<_>>() })))
}

async fn get_model_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<ModelId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let model = memoh_db::providers::get_model(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(model_json(&model)))
}

async fn delete_model_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<ModelId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    memoh_db::providers::delete_model(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(json!({ "ok": true })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
    .route("/providers", post(create_provider_handler).get(list_providers_handler))
    .route(
        "/providers/{id}",
        get(get_provider_handler).delete(delete_provider_handler),
    )
    .route("/models", post(create_model_handler).get(list_models_handler))
    .route("/models/{id}", get(get_model_handler).delete(delete_model_handler))
}
