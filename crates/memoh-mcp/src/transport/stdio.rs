//! Line-delimited JSON-RPC over stdio (the design `/bots/{id}/mcp-stdio`).
//! Grounded on `mcp_bridge::run` loop — same `initialize` /
//! `tools/list` / `tools/call` method set and one-JSON-object-per-line
//! framing, rewritten against tokio's async stdin/stdout and the shared
//! [`memoh_protocol::rpc`] envelope instead of a synchronous `BufReader` and
//! ad hoc JSON-RPC 2.0 objects.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use memoh_protocol::{InboundFrame, ReqFrame, ResFrame};

use crate::provider::{Manager, SessionContext};

/// Runs the stdio loop until stdin is closed (EOF). One session per process
/// invocation — `ctx` is fixed for the whole run, matching the prior build's
/// one-bridge-per-Claude-Code-session model.
pub async fn run(manager: &Manager, ctx: &SessionContext) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let inbound: InboundFrame = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                write_frame(&mut stdout, &ResFrame::err("", "parse_error", &e.to_string())).await?;
                continue;
            }
        };
        let Some(req) = inbound.as_req() else {
            continue;
        };

        let response = handle(manager, ctx, &req).await;
        write_frame(&mut stdout, &response).await?;
    }

    Ok(())
}

async fn handle(manager: &Manager, ctx: &SessionContext, req: &ReqFrame) -> ResFrame {
    match req.method.as_str() {
        "initialize" => ResFrame::ok(
            &req.id,
            json!({
                    "protocolVersion": "2025-06-18",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "memoh", "version": env!("CARGO_PKG_VERSION") }
            }),
        ),
        "tools/list" => {
            let tools = manager.list_tools(ctx).await;
            ResFrame::ok(&req.id, json!({ "tools": tools }))
        }
        "tools/call" => {
            let params = req.params.clone().unwrap_or(Value::Null);
            let Some(name) = params.get("name").and_then(Value::as_str) else {
                return ResFrame::err(&req.id, "invalid_params", "missing tool name");
            };
            let args = params.get("arguments").cloned().unwrap_or(json!({}));
            match manager.call_tool(ctx, name, args).await {
                Ok(result) => ResFrame::ok(&req.id, result),
                Err(e) => ResFrame::err(&req.id, "tool_not_found", &e.to_string()),
            }
        }
        other => ResFrame::err(&req.id, "method_not_found", &format!("unknown method: {other}")),
    }
}

async fn write_frame(stdout: &mut tokio::io::Stdout, frame: &ResFrame) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(frame).unwrap_or_default();
    bytes.push(b'\n');
    stdout.write_all(&bytes).await?;
    stdout.flush().await
}
