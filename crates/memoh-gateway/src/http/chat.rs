//! `POST /chat` and `POST /chat/stream` — a caller-driven turn
//! that bypasses channel routing entirely: no `InboundRouter` persistence,
//! no `message.send` tool call reaching a real channel adapter. The
//! assistant's reply exists only as the `TextDelta` events this handler
//! drains from [`TurnEngine::stream`] — mirrored on `AgentSubagentRunner`
//! in `adapters.rs`, the other place this workspace turns an event stream
//! back into a single string.
//!
//! `bot_id` has no home in the `ChatRequest` body, so this takes it as
//! a `?bot_id=` query parameter — `SessionContext` cannot be built without
//! one.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt as _};
use memoh_core::types::{BotId, EnableAs};
use memoh_mcp::provider::SessionContext;
use memoh_protocol::agent_event::{AgentEvent, TurnInput};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::app::{ApiError, AppState};

#[derive(Deserialize)]
pub struct ChatQuery {
    pub bot_id: BotId,
}

async fn session_context(state: &AppState, bot_id: BotId) -> SessionContext {
    let _ = state;
    SessionContext {
        bot_id,
        current_platform: "http".to_string(),
        reply_target: String::new(),
        channel_identity_id: None,
        user_id: None,
    }
}

/// Fills in a bot's default chat model when the caller leaves `model_ref`
/// empty, the way `engine::resolve` would expect a concrete `ModelId` — a
/// query with no linked chat model surfaces as `NotFound` rather than
/// silently falling back to something the bot owner didn't choose.
async fn resolved_model_ref(state: &AppState, bot_id: BotId, turn: &mut TurnInput) -> Result<(), ApiError> {
    if !turn.model_ref.is_empty() {
        return Ok(());
    }
    let model_id = memoh_db::bots::model_enabled_as(&state.pool, bot_id, EnableAs::Chat)
    .await
    .map_err(memoh_core::MemohError::from)?
    .ok_or_else(|| memoh_core::MemohError::NotFound(format!("bot {bot_id} has no chat model enabled")))?;
    turn.model_ref = model_id.to_string();
    Ok(())
}

/// POST /chat — drains the turn to completion and returns the assembled
/// reply in one response.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChatQuery>,
    Json(mut turn): Json<TurnInput>,
) -> Result<Json<Value>, ApiError> {
    resolved_model_ref(&state, query.bot_id, &mut turn).await?;
    let ctx = session_context(&state, query.bot_id).await;
    let model_ref = turn.model_ref.clone();

    let mut stream = Box::pin(Arc::clone(&state.agent).stream(ctx, turn, CancellationToken::new()));
    let mut reply = String::new();
    let mut error = None;
    while let Some(event) = stream.next().await {
        match event {
            AgentEvent::TextDelta { delta } => reply.push_str(&delta),
            AgentEvent::ProcessingFailed { error: e } => error = Some(e),
            _ => {}
        }
    }
    if let Some(error) = error {
        return Err(ApiError::from(memoh_core::MemohError::Upstream {
                    source: "agent".to_string(),
                    message: error,
        }));
    }
    Ok(Json(json!({ "reply": reply, "model": model_ref })))
}

/// POST /chat/stream — forwards every `AgentEvent` as an SSE frame, ending
/// with a literal `data: [DONE]` once the turn's stream closes.
pub async fn chat_stream_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChatQuery>,
    Json(mut turn): Json<TurnInput>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    resolved_model_ref(&state, query.bot_id, &mut turn).await?;
    let ctx = session_context(&state, query.bot_id).await;

    let events = Arc::clone(&state.agent).stream(ctx, turn, CancellationToken::new());
    let sse = events
    .map(|event| {
            Ok(Event::default()
                .event(event.type_name())
                .json_data(&event)
                .unwrap_or_else(|_| Event::default().data("{}")))
    })
    .chain(futures_util::stream::once(async { Ok(Event::default().data("[DONE]")) }));

    Ok(Sse::new(sse).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
