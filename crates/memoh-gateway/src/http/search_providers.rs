//! `/search-providers` CRUD — backs the `web.search` tool's
//! `SearchProvider` registrations.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use memoh_core::types::{BotId, SearchProviderId};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::{require_user, ApiError, AppState};

fn provider_json(p: &memoh_db::model::SearchProvider) -> Value {
    json!({
            "id": p.id.to_string(),
            "bot_id": p.bot_id.to_string(),
            "name": p.name,
            "endpoint": p.endpoint,
            "api_key": p.api_key,
            "created_at": p.created_at,
            "updated_at": p.updated_at,
    })
}

#[derive(Deserialize)]
pub struct CreateRequest {
    pub bot_id: BotId,
    pub name: String,
    pub endpoint: String,
    pub api_key: Option<String>,
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateRequest>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let provider = memoh_db::search_providers::create(
        &state.pool,
        req.bot_id,
        &req.name,
        &req.endpoint,
        req.api_key.as_deref(),
    )
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(provider_json(&provider)))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub bot_id: BotId,
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::extract::Query(query): axum::extract::Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let providers = memoh_db::search_providers::list_for_bot(&state.pool, query.bot_id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(json!({ "items": providers.iter().map(provider_json).collect::<Vec<_>>() })))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<SearchProviderId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let provider = memoh_db::search_providers::get(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(provider_json(&provider)))
}

#[derive(Deserialize, Default)]
pub struct UpdateRequest {
    pub endpoint: Option<String>,
    pub api_key: Option<Option<String>>,
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<SearchProviderId>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let api_key: Option<Option<&str>> = req.api_key.as_ref().map(|v| v.as_deref());
    let provider = memoh_db::search_providers::update(&state.pool, id, req.endpoint.as_deref(), api_key)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(provider_json(&provider)))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<SearchProviderId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    memoh_db::search_providers::delete(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(json!({ "ok": true })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
    .route("/search-providers", post(create_handler).get(list_handler))
    .route(
        "/search-providers/{id}",
        get(get_handler).patch(update_handler).delete(delete_handler),
    )
}
