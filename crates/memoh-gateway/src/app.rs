use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use memoh_agent::TurnEngine;
use memoh_channel_feishu::FeishuChannel;
use memoh_channel_web::WebChannel;
use memoh_channels::manager::ChannelManager;
use memoh_container::ContainerService;
use memoh_core::types::UserId;
use memoh_core::MemohError;
use memoh_db::PgPool;
use memoh_mcp::transport::http::Endpoint;
use memoh_mcp::Manager;
use memoh_memory::MemoryEngine;
use memoh_router::InboundRouter;
use memoh_scheduler::SchedulerEngine;
use memoh_users::AuthService;
use serde::Serialize;
use serde_json::json;

/// Central shared state, passed as `Arc<AppState>` to every axum handler —
/// generalizes single `AppState` bag-of-subsystems to the
/// components this platform needs instead of the terminal/WS-chat ones it held.
pub struct AppState {
    pub pool: PgPool,
    pub agent: Arc<TurnEngine>,
    pub tools: Arc<Manager>,
    /// Ephemeral per-bot MCP endpoints minted by `POST /bots/{id}/mcp-stdio`,
    /// keyed by the bearer token embedded in their URL.
    pub mcp_endpoints: DashMap<String, Arc<Endpoint>>,
    pub router: Arc<InboundRouter>,
    pub auth: AuthService,
    pub containers: Arc<ContainerService>,
    pub scheduler: Arc<SchedulerEngine>,
    pub memory: Arc<MemoryEngine>,
    pub channels: Arc<ChannelManager>,
    pub web_channel: Arc<WebChannel>,
    pub feishu: Option<Arc<FeishuChannel>>,
}

/// Maps [`MemohError`] onto the platform-wide HTTP error taxonomy —
/// the one place the gateway decides status codes, generalizing the
/// per-handler `(StatusCode, Json<XError>)` tuples into a single
/// `IntoResponse` impl every handler's `Result<_, ApiError>` shares.
pub struct ApiError(MemohError);

impl From<MemohError> for ApiError {
    fn from(err: MemohError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

/// Resolves the caller's `UserId` from `Authorization: Bearer <jwt>`,
/// generalizing `check_auth`/`extract_bearer` pair (a static
/// token compare) to per-user JWT verification via [`AuthService`]. Used by
/// every CRUD handler; `/chat`, `/bots/{id}/web/*`, and
/// the channel webhook routes stay open.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let token = extract_bearer(headers).ok_or_else(|| {
            MemohError::AuthFailed("missing Authorization: Bearer <token> header".to_string())
    })?;
    state
    .auth
    .verify_token(token)
    .map_err(|e| ApiError(MemohError::from(e)))
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
}

/// GET / — a minimal landing response, matching root route
/// (there the chat UI; here just a version/name probe since this workspace
/// carries no bundled frontend).
async fn root_handler(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "name": "memoh-gateway", "version": env!("CARGO_PKG_VERSION") }))
}

/// Assembles the full axum router (the external interface table plus
/// the CRUD groups), generalizing `skynet_gateway::app::build_router`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
    .route("/", get(root_handler))
    .route("/health", get(crate::http::health::health_handler))
    .route("/auth/login", post(crate::http::auth::login_handler))
    .route("/chat", post(crate::http::chat::chat_handler))
    .route("/chat/stream", post(crate::http::chat::chat_stream_handler))
    .route(
        "/bots/{id}/messages",
        get(crate::http::messages::list_messages_handler),
    )
    .route(
        "/bots/{id}/messages/events",
        get(crate::http::messages::messages_events_handler),
    )
    .route(
        "/bots/{id}/web/messages",
        post(crate::http::web::web_messages_handler),
    )
    .route(
        "/bots/{id}/web/stream",
        get(crate::http::web::web_stream_handler),
    )
    .route(
        "/bots/{id}/mcp-stdio",
        post(crate::http::mcp_stdio::mint_handler),
    )
    .route("/mcp/{token}", post(crate::http::mcp_stdio::call_handler))
    .route(
        "/webhooks/feishu",
        post(crate::http::webhooks::feishu_webhook_handler),
    )
    .merge(crate::http::bots::router())
    .merge(crate::http::providers::router())
    .merge(crate::http::schedule::router())
    .merge(crate::http::search_providers::router())
    .merge(crate::http::settings::router())
    .merge(crate::http::subagents::router())
    .with_state(state)
    .layer(tower_http::trace::TraceLayer::new_for_http())
}
