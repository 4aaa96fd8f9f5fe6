//! Per-bot ephemeral HTTP+SSE MCP endpoint (the design
//! `POST /bots/{id}/mcp-stdio` mints the URL). Axum route mounting belongs
//! to `memoh-gateway`; this module owns the request/response semantics so
//! the gateway only has to wire headers and bytes through [`Endpoint`].
//!
//! Bearer check is grounded on `http::chat::check_auth` /
//! `extract_bearer` — a plain constant-time-insensitive string compare
//! against one expected token, except here the token is minted per-endpoint
//! rather than read from static config.

use uuid::Uuid;

use memoh_protocol::{ReqFrame, ResFrame};

use crate::provider::{Manager, SessionContext};
use std::sync::Arc;

/// One ephemeral MCP endpoint, valid until the process or its owning bot
/// session drops it. `token` is shared out-of-band as part of the minted
/// URL (`/mcp/{token}`); the caller also sends it as a Bearer header.
pub struct Endpoint {
    pub token: String,
    manager: Arc<Manager>,
    ctx: SessionContext,
}

impl Endpoint {
    pub fn new(manager: Arc<Manager>, ctx: SessionContext) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            manager,
            ctx,
        }
    }

    pub fn check_auth(&self, authorization_header: Option<&str>) -> bool {
        extract_bearer(authorization_header)
        .map(|t| t == self.token)
        .unwrap_or(false)
    }

    /// Handles one JSON-RPC request frame over the shared envelope (same
    /// method set as the stdio transport: `initialize`, `tools/list`,
    /// `tools/call`).
    pub async fn handle(&self, req: ReqFrame) -> ResFrame {
        match req.method.as_str() {
            "initialize" => ResFrame::ok(
                &req.id,
                serde_json::json!({
                        "protocolVersion": "2025-06-18",
                        "capabilities": { "tools": {} },
                        "serverInfo": { "name": "memoh", "version": env!("CARGO_PKG_VERSION") }
                }),
            ),
            "tools/list" => {
                let tools = self.manager.list_tools(&self.ctx).await;
                ResFrame::ok(&req.id, serde_json::json!({ "tools": tools }))
            }
            "tools/call" => {
                let params = req.params.clone().unwrap_or(serde_json::Value::Null);
                let Some(name) = params.get("name").and_then(serde_json::Value::as_str) else {
                    return ResFrame::err(&req.id, "invalid_params", "missing tool name");
                };
                let args = params.get("arguments").cloned().unwrap_or(serde_json::json!({}));
                match self.manager.call_tool(&self.ctx, name, args).await {
                    Ok(result) => ResFrame::ok(&req.id, result),
                    Err(e) => ResFrame::err(&req.id, "tool_not_found", &e.to_string()),
                }
            }
            other => ResFrame::err(&req.id, "method_not_found", &format!("unknown method: {other}")),
        }
    }
}

fn extract_bearer(header: Option<&str>) -> Option<&str> {
    header.and_then(|v| v.strip_prefix("Bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_must_carry_exact_token() {
        assert_eq!(extract_bearer(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(Some("abc")), None);
        assert_eq!(extract_bearer(None), None);
    }
}
