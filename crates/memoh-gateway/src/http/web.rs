//! `POST /bots/{id}/web/messages` and `GET /bots/{id}/web/stream`
//! — the built-in web channel's HTTP surface, backed by `memoh-channel-web`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::Utc;
use futures_util::Stream;
use memoh_channels::types::{ConversationRef, Identity, InboundMessage};
use memoh_core::types::{BotId, ConnId};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

use crate::app::{ApiError, AppState};

#[derive(Deserialize)]
pub struct WebMessageBody {
    pub message: WebMessagePayload,
    #[serde(default)]
    pub conn_id: Option<String>,
}

#[derive(Deserialize)]
pub struct WebMessagePayload {
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Each browser tab mints (or replays) its own `conn_id`, which doubles as
/// both the sender's external identity and the reply target — there's no
/// separate login for the web channel, matching `WebChannel::match_binding`
/// always returning `false` ("every browser tab is its own ephemeral
/// identity").
pub async fn web_messages_handler(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<BotId>,
    Json(body): Json<WebMessageBody>,
) -> Result<Json<Value>, ApiError> {
    let conn_id = body.conn_id.unwrap_or_else(|| ConnId::new().to_string());
    let msg = InboundMessage {
        channel: "web".to_string(),
        message: json!({ "text": body.message.text, "attachments": body.message.attachments }),
        reply_target: format!("web:{conn_id}"),
        sender: Identity {
            channel: "web".to_string(),
            external_id: conn_id.clone(),
            display_name: None,
            avatar_url: None,
        },
        conversation: ConversationRef {
            external_conversation_id: conn_id,
            thread_id: None,
            conversation_type: Some("direct".to_string()),
        },
        received_at: Utc::now(),
        external_message_id: None,
        source: None,
    };
    state.web_channel.submit_inbound(msg).await;
    let _ = bot_id;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct WebStreamQuery {
    pub conn_id: Option<String>,
}

pub async fn web_stream_handler(
    State(state): State<Arc<AppState>>,
    Path(_bot_id): Path<BotId>,
    Query(query): Query<WebStreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let conn_id: ConnId = query
    .conn_id
    .and_then(|s| s.parse().ok())
    .unwrap_or_default();
    let rx = state.web_channel.subscribe(conn_id);
    let stream = ReceiverStream::new(rx).map(|msg| {
            Ok(Event::default()
                .json_data(&msg)
                .unwrap_or_else(|_| Event::default().data("{}")))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
