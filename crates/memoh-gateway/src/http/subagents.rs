//! `/subagents` CRUD — the only soft-deleted entity in the data
//! model; `delete_handler` maps straight onto `memoh-db::subagents`'s
//! `deleted_at` column rather than a hard `DELETE`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use memoh_core::types::{BotId, ModelId, SubagentId};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::{require_user, ApiError, AppState};

fn subagent_json(s: &memoh_db::model::Subagent) -> Value {
    json!({
            "id": s.id.to_string(),
            "bot_id": s.bot_id.to_string(),
            "name": s.name,
            "description": s.description,
            "allowed_actions": s.allowed_actions,
            "system_prompt": s.system_prompt,
            "model_id": s.model_id.map(|m| m.to_string()),
            "created_at": s.created_at,
            "updated_at": s.updated_at,
    })
}

#[derive(Deserialize)]
pub struct CreateRequest {
    pub bot_id: BotId,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub allowed_actions: Value,
    pub system_prompt: Option<String>,
    pub model_id: Option<ModelId>,
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateRequest>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let subagent = memoh_db::subagents::create(
        &state.pool,
        req.bot_id,
        &req.name,
        req.description.as_deref(),
        req.allowed_actions,
        req.system_prompt.as_deref(),
        req.model_id,
    )
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(subagent_json(&subagent)))
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
    let subagents = memoh_db::subagents::list_for_bot(&state.pool, query.bot_id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(json!({ "items": subagents.iter().map(subagent_json).collect::<Vec<_>>() })))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<SubagentId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let subagent = memoh_db::subagents::get(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(subagent_json(&subagent)))
}

#[derive(Deserialize, Default)]
pub struct UpdateRequest {
    pub description: Option<String>,
    pub allowed_actions: Option<Value>,
    pub system_prompt: Option<String>,
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<SubagentId>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let subagent = memoh_db::subagents::update(
        &state.pool,
        id,
        req.description.as_deref(),
        req.allowed_actions,
        req.system_prompt.as_deref(),
    )
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(subagent_json(&subagent)))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<SubagentId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    memoh_db::subagents::delete(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(json!({ "ok": true })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
    .route("/subagents", post(create_handler).get(list_handler))
    .route(
        "/subagents/{id}",
        get(get_handler).patch(update_handler).delete(delete_handler),
    )
}
