//! `GET /bots/{id}/messages` and `GET /bots/{id}/messages/events`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use memoh_core::types::BotId;
use memoh_protocol::stream_event::MessageStreamEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::app::{ApiError, AppState};

#[derive(Deserialize)]
pub struct ListMessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub before: Option<DateTime<Utc>>,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<BotId>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Value>, ApiError> {
    let messages =
    memoh_db::messages::list_for_bot_page(&state.pool, bot_id, query.limit, query.before)
    .await
    .map_err(memoh_core::MemohError::from)?;
    let items: Vec<Value> = messages
    .into_iter()
    .map(|m| {
            json!({
                    "id": m.id.to_string(),
                    "bot_id": m.bot_id.to_string(),
                    "role": m.role.to_string(),
                    "content": m.content,
                    "created_at": m.created_at,
            })
    })
    .collect();
    Ok(Json(json!({ "items": items })))
}

#[derive(Deserialize)]
pub struct EventsQuery {
    #[allow(dead_code)]
    pub since: Option<DateTime<Utc>>,
}

/// `since` is accepted for wire compatibility but this is a live tail, not
/// a replay — the design accepts lost events being "recovered on next poll
/// via `ListSince`" (i.e. `GET /bots/{id}/messages`), so a reconnecting
/// client's catch-up path is the list endpoint, not this stream.
pub async fn messages_events_handler(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<BotId>,
    Query(_query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.router.events().subscribe(bot_id);
    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
            Ok(event) => Some(Ok(sse_event(&event))),
            Err(_lagged) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn sse_event(event: &MessageStreamEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|_| Event::default().data("{}"))
}
