//! `/settings/{bot_id}` — thin view onto a bot's own mutable
//! fields. There is no separate `settings` table in its data model; this
//! is `memoh-db::bots::update_settings` under a dedicated URL, the same
//! way `schedule.rs`'s HTTP layer is a view onto
//! `memoh-db::schedules`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, put};
use axum::{Json, Router};
use memoh_core::types::BotId;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::{require_user, ApiError, AppState};

fn settings_json(bot: &memoh_db::model::Bot) -> Value {
    json!({
            "bot_id": bot.id.to_string(),
            "display_name": bot.display_name,
            "avatar_url": bot.avatar_url,
            "max_context_tokens": bot.max_context_tokens,
            "metadata": bot.metadata,
            "updated_at": bot.updated_at,
    })
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(bot_id): Path<BotId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let bot = memoh_db::bots::get(&state.pool, bot_id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(settings_json(&bot)))
}

#[derive(Deserialize, Default)]
pub struct UpdateSettingsRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub max_context_tokens: Option<i32>,
    pub metadata: Option<Value>,
}

async fn put_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(bot_id): Path<BotId>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = require_user(&state, &headers)?;
    let bot = memoh_db::bots::get(&state.pool, bot_id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    if bot.owner_user_id != user_id {
        return Err(ApiError::from(memoh_core::MemohError::PermissionDenied(
                    "not the owner of this bot".to_string(),
        )));
    }
    let bot = memoh_db::bots::update_settings(
        &state.pool,
        bot_id,
        req.display_name.as_deref(),
        req.avatar_url.as_deref(),
        req.max_context_tokens,
        req.metadata,
    )
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(settings_json(&bot)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/settings/{bot_id}", get(get_handler).put(put_handler))
}
