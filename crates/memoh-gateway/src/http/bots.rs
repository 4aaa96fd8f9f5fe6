//! `/bots` CRUD — owner-scoped bot lifecycle.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use memoh_core::types::{BotId, BotType};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::{require_user, ApiError, AppState};

fn bot_json(bot: &memoh_db::model::Bot) -> Value {
    json!({
            "id": bot.id.to_string(),
            "owner_user_id": bot.owner_user_id.to_string(),
            "type": bot.bot_type,
            "display_name": bot.display_name,
            "avatar_url": bot.avatar_url,
            "is_active": bot.is_active,
            "metadata": bot.metadata,
            "max_context_tokens": bot.max_context_tokens,
            "created_at": bot.created_at,
            "updated_at": bot.updated_at,
    })
}

#[derive(Deserialize)]
pub struct CreateBotRequest {
    #[serde(rename = "type")]
    pub bot_type: BotType,
    pub display_name: String,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: i32,
}

fn default_max_context_tokens() -> i32 {
    32_000
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBotRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = require_user(&state, &headers)?;
    let bot = memoh_db::bots::create(
        &state.pool,
        user_id,
        req.bot_type,
        &req.display_name,
        req.max_context_tokens,
    )
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(bot_json(&bot)))
}

/// Lists the caller's own bots plus every active public bot, matching the design's
/// "the only entity a user can observe without owning it is a conversation
/// on a public bot" — the bot row itself is visible to any authenticated
/// caller, ownership gates write access instead.
async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = require_user(&state, &headers)?;
    let mut bots = memoh_db::bots::list_by_owner(&state.pool, user_id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    let public = memoh_db::bots::list_public(&state.pool)
    .await
    .map_err(memoh_core::MemohError::from)?;
    for bot in public {
        if !bots.iter().any(|b| b.id == bot.id) {
            bots.push(bot);
        }
    }
    Ok(Json(json!({ "items": bots.iter().map(bot_json).collect::<Vec<_>>() })))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<BotId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let bot = memoh_db::bots::get(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(bot_json(&bot)))
}

#[derive(Deserialize, Default)]
pub struct UpdateBotRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub max_context_tokens: Option<i32>,
    pub metadata: Option<Value>,
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<BotId>,
    Json(req): Json<UpdateBotRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = require_user(&state, &headers)?;
    require_owner(&state, id, user_id).await?;
    let bot = memoh_db::bots::update_settings(
        &state.pool,
        id,
        req.display_name.as_deref(),
        req.avatar_url.as_deref(),
        req.max_context_tokens,
        req.metadata,
    )
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(bot_json(&bot)))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<BotId>,
) -> Result<Json<Value>, ApiError> {
    let user_id = require_user(&state, &headers)?;
    require_owner(&state, id, user_id).await?;
    memoh_db::bots::delete(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(json!({ "ok": true })))
}

async fn require_owner(state: &AppState, bot_id: BotId, user_id: memoh_core::types::UserId) -> Result<(), ApiError> {
    let bot = memoh_db::bots::get(&state.pool, bot_id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    if bot.owner_user_id != user_id {
        return Err(ApiError::from(memoh_core::MemohError::PermissionDenied(
                    "not the owner of this bot".to_string(),
        )));
    }
    Ok(())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
    .route("/bots", post(create_handler).get(list_handler))
    .route(
        "/bots/{id}",
        get(get_handler).patch(update_handler).delete(delete_handler),
    )
}
