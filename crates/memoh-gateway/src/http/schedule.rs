//! `/schedule` CRUD. Every mutation reloads the
//! affected timer on [`SchedulerEngine`] — "CRUD mutations reload the
//! affected timer transactionally: create/enable → start; disable/delete →
//! stop and drain" — so these handlers call into the engine, not
//! just `memoh-db::schedules`, after each write.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use memoh_core::types::{BotId, ScheduleId};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::{require_user, ApiError, AppState};

fn schedule_json(s: &memoh_db::model::Schedule) -> Value {
    json!({
            "id": s.id.to_string(),
            "bot_id": s.bot_id.to_string(),
            "name": s.name,
            "description": s.description,
            "pattern": s.cron_pattern,
            "command": s.command,
            "max_calls": s.max_calls,
            "current_calls": s.current_calls,
            "enabled": s.enabled,
            "next_run_at": s.next_run_at,
            "last_run_at": s.last_run_at,
            "created_at": s.created_at,
            "updated_at": s.updated_at,
    })
}

#[derive(Deserialize)]
pub struct CreateScheduleRequest {
    pub bot_id: BotId,
    pub name: String,
    pub description: Option<String>,
    pub pattern: String,
    pub command: Value,
    pub max_calls: Option<i32>,
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let schedule = memoh_db::schedules::create(
        &state.pool,
        req.bot_id,
        &req.name,
        req.description.as_deref(),
        &req.pattern,
        req.command,
        req.max_calls,
        None,
    )
    .await
    .map_err(memoh_core::MemohError::from)?;
    if let Err(e) = state.scheduler.reload(schedule.id).await {
        tracing::warn!(schedule_id = %schedule.id, error = %e, "failed to arm timer after create");
    }
    Ok(Json(schedule_json(&schedule)))
}

#[derive(Deserialize)]
pub struct ListScheduleQuery {
    pub bot_id: BotId,
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::extract::Query(query): axum::extract::Query<ListScheduleQuery>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let schedules = memoh_db::schedules::list_for_bot(&state.pool, query.bot_id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(json!({ "items": schedules.iter().map(schedule_json).collect::<Vec<_>>() })))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<ScheduleId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let schedule = memoh_db::schedules::get(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    Ok(Json(schedule_json(&schedule)))
}

#[derive(Deserialize, Default)]
pub struct UpdateScheduleRequest {
    pub pattern: Option<String>,
    pub max_calls: Option<Option<i32>>,
    pub enabled: Option<bool>,
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<ScheduleId>,
    Json(req): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    let schedule = memoh_db::schedules::update(&state.pool, id, req.pattern.as_deref(), req.max_calls, req.enabled)
    .await
    .map_err(memoh_core::MemohError::from)?;
    if let Err(e) = state.scheduler.reload(schedule.id).await {
        tracing::warn!(schedule_id = %schedule.id, error = %e, "failed to re-arm timer after update");
    }
    Ok(Json(schedule_json(&schedule)))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<ScheduleId>,
) -> Result<Json<Value>, ApiError> {
    let _ = require_user(&state, &headers)?;
    memoh_db::schedules::delete(&state.pool, id)
    .await
    .map_err(memoh_core::MemohError::from)?;
    state.scheduler.stop(id);
    Ok(Json(json!({ "ok": true })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
    .route("/schedule", post(create_handler).get(list_handler))
    .route(
        "/schedule/{id}",
        get(get_handler).patch(update_handler).delete(delete_handler),
    )
}
