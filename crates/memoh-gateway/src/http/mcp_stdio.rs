//! `POST /bots/{id}/mcp-stdio` mints an ephemeral MCP endpoint; `POST
//! /mcp/{token}` is where a caller actually drives it.
//!
//! `{name, command, args, env, cwd}` in the mint request describes an
//! external stdio MCP server the design leaves unconnected to any concrete
//! process launcher (the design only requires "the tool plane can expose external
//! HTTP/SSE MCP endpoints registered for the bot"); this binds the minted
//! URL to the bot's own in-process `Manager` instead of spawning a child
//! process, which is the only MCP server this workspace actually runs.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use memoh_core::types::BotId;
use memoh_mcp::provider::SessionContext;
use memoh_mcp::transport::http::Endpoint;
use memoh_protocol::{ReqFrame, ResFrame};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::{ApiError, AppState};

#[derive(Deserialize)]
pub struct MintRequest {
    #[allow(dead_code)]
    pub name: String,
    #[allow(dead_code)]
    pub command: Option<String>,
    #[allow(dead_code)]
    pub args: Option<Vec<String>>,
    #[allow(dead_code)]
    pub env: Option<Value>,
    #[allow(dead_code)]
    pub cwd: Option<String>,
}

pub async fn mint_handler(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<BotId>,
    Json(_req): Json<MintRequest>,
) -> Result<Json<Value>, ApiError> {
    let ctx = SessionContext {
        bot_id,
        current_platform: "mcp".to_string(),
        reply_target: String::new(),
        channel_identity_id: None,
        user_id: None,
    };
    let endpoint = Arc::new(Endpoint::new(Arc::clone(&state.tools), ctx));
    let token = endpoint.token.clone();
    state.mcp_endpoints.insert(token.clone(), endpoint);
    Ok(Json(json!({ "url": format!("/mcp/{token}") })))
}

pub async fn call_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ReqFrame>,
) -> Result<Json<ResFrame>, ApiError> {
    let auth = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok());
    // Clone the Arc out and drop the DashMap shard guard before awaiting
    // `handle` — holding a guard across an await would block other bots'
    // endpoints sharing the same shard for the call's whole duration.
    let Some(endpoint) = state.mcp_endpoints.get(&token).map(|e| Arc::clone(&e)) else {
        return Err(ApiError::from(memoh_core::MemohError::NotFound(format!(
                        "no mcp endpoint for token {token}"
        ))));
    };
    if !endpoint.check_auth(auth) {
        return Err(ApiError::from(memoh_core::MemohError::AuthFailed(
                    "bad mcp bearer token".to_string(),
        )));
    }
    Ok(Json(endpoint.handle(req).await))
}
