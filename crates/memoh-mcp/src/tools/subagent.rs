//! `subagent.list`/`create`/`delete`/`query`. A sub-agent
//! is a named, bot-scoped tool-restricted persona (`allowed_actions`, an
//! optional dedicated model and system prompt) that a turn can delegate a
//! sub-task to; `query` runs that delegation synchronously against an
//! abstract [`SubagentRunner`] port, since the agent turn engine
//! (`memoh-agent`) sits above this crate in the dependency order.

use std::sync::Arc;

use async_trait::async_trait;
use memoh_core::types::{BotId, SubagentId};
use memoh_db::PgPool;
use serde_json::Value;

use crate::error::{McpError, Result};
use crate::provider::{err_result, ok_result, SessionContext, ToolDescriptor, ToolProvider};

#[async_trait]
pub trait SubagentRunner: Send + Sync {
    /// Runs `prompt` through the named sub-agent's restricted tool set and
    /// returns its final text reply.
    async fn query(&self, bot_id: BotId, subagent_id: SubagentId, prompt: &str) -> std::result::Result<String, String>;
}

pub struct SubagentToolProvider {
    pool: PgPool,
    runner: Arc<dyn SubagentRunner>,
}

impl SubagentToolProvider {
    pub fn new(pool: PgPool, runner: Arc<dyn SubagentRunner>) -> Self {
        Self { pool, runner }
    }
}

fn subagent_json(s: &memoh_db::model::Subagent) -> Value {
    serde_json::json!({
            "id": s.id.to_string(),
            "bot_id": s.bot_id.to_string(),
            "name": s.name,
            "description": s.description,
            "allowed_actions": s.allowed_actions,
            "system_prompt": s.system_prompt,
            "model_id": s.model_id.map(|m| m.to_string()),
    })
}

#[async_trait]
impl ToolProvider for SubagentToolProvider {
    fn provider_name(&self) -> &str {
        "subagent"
    }

    async fn list_tools(&self, _ctx: &SessionContext) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "subagent.list",
                "List this bot's configured sub-agents",
                serde_json::json!({"type": "object", "properties": {}}),
            ),
            ToolDescriptor::new(
                "subagent.create",
                "Create a named, tool-restricted sub-agent",
                serde_json::json!({
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "description": {"type": "string"},
                            "allowed_actions": {"type": "array", "items": {"type": "string"}},
                            "system_prompt": {"type": "string"}
                        },
                        "required": ["name", "allowed_actions"]
                }),
            ),
            ToolDescriptor::new(
                "subagent.delete",
                "Delete (soft) a sub-agent by id",
                serde_json::json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]}),
            ),
            ToolDescriptor::new(
                "subagent.query",
                "Delegate a prompt to a named sub-agent and wait for its reply",
                serde_json::json!({
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "prompt": {"type": "string"}
                        },
                        "required": ["id", "prompt"]
                }),
            ),
        ]
    }

    async fn call_tool(&self, ctx: &SessionContext, name: &str, args: Value) -> Result<Value> {
        match name {
            "subagent.list" => match memoh_db::subagents::list_for_bot(&self.pool, ctx.bot_id).await {
                Ok(list) => Ok(ok_result(serde_json::json!({ "subagents": list.iter().map(subagent_json).collect::<Vec<_>>() }))),
                Err(e) => Ok(err_result(e.to_string())),
            },
            "subagent.create" => {
                let Some(name_) = args.get("name").and_then(Value::as_str) else {
                    return Ok(err_result("name is required"));
                };
                let Some(allowed_actions) = args.get("allowed_actions").cloned() else {
                    return Ok(err_result("allowed_actions is required"));
                };
                let description = args.get("description").and_then(Value::as_str);
                let system_prompt = args.get("system_prompt").and_then(Value::as_str);
                match memoh_db::subagents::create(
                    &self.pool,
                    ctx.bot_id,
                    name_,
                    description,
                    allowed_actions,
                    system_prompt,
                    None,
                )
                .await
                {
                    Ok(s) => Ok(ok_result(subagent_json(&s))),
                    Err(e) => Ok(err_result(e.to_string())),
                }
            }
            "subagent.delete" => {
                let Some(id) = parse_id(&args) else {
                    return Ok(err_result("id is required"));
                };
                match memoh_db::subagents::delete(&self.pool, id).await {
                    Ok(()) => Ok(ok_result(serde_json::json!({ "id": id.to_string() }))),
                    Err(e) => Ok(err_result(e.to_string())),
                }
            }
            "subagent.query" => {
                let Some(id) = parse_id(&args) else {
                    return Ok(err_result("id is required"));
                };
                let Some(prompt) = args.get("prompt").and_then(Value::as_str) else {
                    return Ok(err_result("prompt is required"));
                };
                if memoh_db::subagents::get(&self.pool, id).await.is_err() {
                    return Ok(err_result(format!("no such subagent: {id}")));
                }
                match self.runner.query(ctx.bot_id, id, prompt).await {
                    Ok(reply) => Ok(ok_result(serde_json::json!({ "reply": reply }))),
                    Err(e) => Ok(err_result(e)),
                }
            }
            other => Err(McpError::ToolNotFound(other.to_string())),
        }
    }
}

fn parse_id(args: &Value) -> Option<SubagentId> {
    args.get("id").and_then(Value::as_str).and_then(|s| s.parse().ok())
}
