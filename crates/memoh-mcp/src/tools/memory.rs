//! `memory.search`/`add`/`update`/`delete` tools. Delegates to a
//! [`MemoryStore`] port rather than depending on `memoh-memory` directly —
//! `memoh-mcp` sits below `memoh-agent` in the dependency graph and
//! `memoh-memory` is built independently; the gateway wires the concrete
//! `memoh-memory` engine in at startup.

use std::sync::Arc;

use async_trait::async_trait;
use memoh_core::types::BotId;
use serde_json::Value;

use crate::error::{McpError, Result};
use crate::provider::{err_result, ok_result, SessionContext, ToolDescriptor, ToolProvider};

#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryHit {
    pub id: String,
    pub content: String,
    pub score: f32,
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn search(&self, bot_id: BotId, query: &str, top_k: usize) -> std::result::Result<Vec<MemoryHit>, String>;
    async fn add(&self, bot_id: BotId, content: &str) -> std::result::Result<String, String>;
    async fn update(&self, bot_id: BotId, id: &str, content: &str) -> std::result::Result<(), String>;
    async fn delete(&self, bot_id: BotId, id: &str) -> std::result::Result<(), String>;
}

pub struct MemoryToolProvider {
    store: Arc<dyn MemoryStore>,
}

impl MemoryToolProvider {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolProvider for MemoryToolProvider {
    fn provider_name(&self) -> &str {
        "memory"
    }

    async fn list_tools(&self, _ctx: &SessionContext) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "memory.search",
                "Hybrid (vector + keyword) search over this bot's long-term memory",
                serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}, "top_k": {"type": "integer"}}, "required": ["query"]}),
            ),
            ToolDescriptor::new(
                "memory.add",
                "Add a new memory record for this bot",
                serde_json::json!({"type": "object", "properties": {"content": {"type": "string"}}, "required": ["content"]}),
            ),
            ToolDescriptor::new(
                "memory.update",
                "Update an existing memory record by id",
                serde_json::json!({"type": "object", "properties": {"id": {"type": "string"}, "content": {"type": "string"}}, "required": ["id", "content"]}),
            ),
            ToolDescriptor::new(
                "memory.delete",
                "Delete a memory record by id",
                serde_json::json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]}),
            ),
        ]
    }

    async fn call_tool(&self, ctx: &SessionContext, name: &str, args: Value) -> Result<Value> {
        match name {
            "memory.search" => {
                let Some(query) = args.get("query").and_then(Value::as_str) else {
                    return Ok(err_result("query is required"));
                };
                let top_k = args.get("top_k").and_then(Value::as_u64).unwrap_or(10) as usize;
                match self.store.search(ctx.bot_id, query, top_k).await {
                    Ok(hits) => Ok(ok_result(serde_json::json!({ "results": hits }))),
                    Err(e) => Ok(err_result(e)),
                }
            }
            "memory.add" => {
                let Some(content) = args.get("content").and_then(Value::as_str) else {
                    return Ok(err_result("content is required"));
                };
                match self.store.add(ctx.bot_id, content).await {
                    Ok(id) => Ok(ok_result(serde_json::json!({ "id": id }))),
                    Err(e) => Ok(err_result(e)),
                }
            }
            "memory.update" => {
                let (Some(id), Some(content)) = (
                    args.get("id").and_then(Value::as_str),
                    args.get("content").and_then(Value::as_str),
                ) else {
                    return Ok(err_result("id and content are required"));
                };
                match self.store.update(ctx.bot_id, id, content).await {
                    Ok(()) => Ok(ok_result(serde_json::json!({ "id": id }))),
                    Err(e) => Ok(err_result(e)),
                }
            }
            "memory.delete" => {
                let Some(id) = args.get("id").and_then(Value::as_str) else {
                    return Ok(err_result("id is required"));
                };
                match self.store.delete(ctx.bot_id, id).await {
                    Ok(()) => Ok(ok_result(serde_json::json!({ "id": id }))),
                    Err(e) => Ok(err_result(e)),
                }
            }
            other => Err(McpError::ToolNotFound(other.to_string())),
        }
    }
}
