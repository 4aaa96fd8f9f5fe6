//! `schedule.list`/`get`/`create`/`update`/`delete`. Talks
//! to `memoh-db::schedules` directly — scheduling state is plain CRUD, there
//! is no runtime seam to abstract the way `memory`/`web` need one. Every
//! mutation reloads the affected timer afterward ("CRUD
//! mutations reload the affected timer transactionally") through the
//! [`ScheduleReloader`] port — `memoh-mcp` sits below `memoh-scheduler` in
//! dependency order (the scheduler drives turns through `memoh-agent`,
//! which itself calls into this crate), so the concrete
//! `memoh_scheduler::SchedulerEngine` is wired in from the gateway instead
//! of named here directly.

use std::sync::Arc;

use async_trait::async_trait;
use memoh_core::types::ScheduleId;
use memoh_db::PgPool;
use serde_json::Value;

use crate::error::{McpError, Result};
use crate::provider::{err_result, ok_result, SessionContext, ToolDescriptor, ToolProvider};

/// Re-arms (or stops) a schedule's timer after a CRUD mutation. Implemented
/// in the gateway as a thin wrapper over `memoh_scheduler::SchedulerEngine`.
#[async_trait]
pub trait ScheduleReloader: Send + Sync {
    async fn reload(&self, id: ScheduleId) -> std::result::Result<(), String>;
}

pub struct ScheduleToolProvider {
    pool: PgPool,
    reloader: Option<Arc<dyn ScheduleReloader>>,
}

impl ScheduleToolProvider {
    pub fn new(pool: PgPool, reloader: Option<Arc<dyn ScheduleReloader>>) -> Self {
        Self { pool, reloader }
    }

    async fn reload(&self, id: ScheduleId) {
        if let Some(reloader) = &self.reloader {
            if let Err(e) = reloader.reload(id).await {
                tracing::warn!(schedule_id = %id, error = %e, "failed to reload timer after mutation");
            }
        }
    }
}

fn schedule_json(s: &memoh_db::model::Schedule) -> Value {
    serde_json::json!({
            "id": s.id.to_string(),
            "bot_id": s.bot_id.to_string(),
            "name": s.name,
            "description": s.description,
            "cron_pattern": s.cron_pattern,
            "command": s.command,
            "max_calls": s.max_calls,
            "current_calls": s.current_calls,
            "enabled": s.enabled,
            "next_run_at": s.next_run_at,
            "last_run_at": s.last_run_at,
    })
}

#[async_trait]
impl ToolProvider for ScheduleToolProvider {
    fn provider_name(&self) -> &str {
        "schedule"
    }

    async fn list_tools(&self, _ctx: &SessionContext) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "schedule.list",
                "List this bot's scheduled jobs",
                serde_json::json!({"type": "object", "properties": {}}),
            ),
            ToolDescriptor::new(
                "schedule.get",
                "Fetch one scheduled job by id",
                serde_json::json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]}),
            ),
            ToolDescriptor::new(
                "schedule.create",
                "Create a cron-driven scheduled job",
                serde_json::json!({
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "description": {"type": "string"},
                            "cron_pattern": {"type": "string"},
                            "command": {"type": "object"},
                            "max_calls": {"type": "integer"}
                        },
                        "required": ["name", "cron_pattern", "command"]
                }),
            ),
            ToolDescriptor::new(
                "schedule.update",
                "Update a scheduled job's cron pattern, cap, or enabled flag",
                serde_json::json!({
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "cron_pattern": {"type": "string"},
                            "max_calls": {"type": "integer"},
                            "enabled": {"type": "boolean"}
                        },
                        "required": ["id"]
                }),
            ),
            ToolDescriptor::new(
                "schedule.delete",
                "Delete a scheduled job",
                serde_json::json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]}),
            ),
        ]
    }

    async fn call_tool(&self, ctx: &SessionContext, name: &str, args: Value) -> Result<Value> {
        match name {
            "schedule.list" => match memoh_db::schedules::list_for_bot(&self.pool, ctx.bot_id).await {
                Ok(list) => Ok(ok_result(serde_json::json!({ "schedules": list.iter().map(schedule_json).collect::<Vec<_>>() }))),
                Err(e) => Ok(err_result(e.to_string())),
            },
            "schedule.get" => {
                let Some(id) = parse_id(&args) else {
                    return Ok(err_result("id is required"));
                };
                match memoh_db::schedules::get(&self.pool, id).await {
                    Ok(s) => Ok(ok_result(schedule_json(&s))),
                    Err(e) => Ok(err_result(e.to_string())),
                }
            }
            "schedule.create" => {
                let (Some(name_), Some(cron_pattern)) = (
                    args.get("name").and_then(Value::as_str),
                    args.get("cron_pattern").and_then(Value::as_str),
                ) else {
                    return Ok(err_result("name and cron_pattern are required"));
                };
                let command = args.get("command").cloned().unwrap_or(Value::Object(Default::default()));
                let description = args.get("description").and_then(Value::as_str);
                let max_calls = args.get("max_calls").and_then(Value::as_i64).map(|v| v as i32);
                match memoh_db::schedules::create(
                    &self.pool,
                    ctx.bot_id,
                    name_,
                    description,
                    cron_pattern,
                    command,
                    max_calls,
                    None,
                )
                .await
                {
                    Ok(s) => {
                        self.reload(s.id).await;
                        Ok(ok_result(schedule_json(&s)))
                    }
                    Err(e) => Ok(err_result(e.to_string())),
                }
            }
            "schedule.update" => {
                let Some(id) = parse_id(&args) else {
                    return Ok(err_result("id is required"));
                };
                let cron_pattern = args.get("cron_pattern").and_then(Value::as_str);
                let max_calls = args.get("max_calls").map(|v| v.as_i64().map(|n| n as i32));
                let enabled = args.get("enabled").and_then(Value::as_bool);
                match memoh_db::schedules::update(&self.pool, id, cron_pattern, max_calls, enabled).await {
                    Ok(s) => {
                        self.reload(s.id).await;
                        Ok(ok_result(schedule_json(&s)))
                    }
                    Err(e) => Ok(err_result(e.to_string())),
                }
            }
            "schedule.delete" => {
                let Some(id) = parse_id(&args) else {
                    return Ok(err_result("id is required"));
                };
                match memoh_db::schedules::delete(&self.pool, id).await {
                    Ok(()) => {
                        self.reload(id).await;
                        Ok(ok_result(serde_json::json!({ "id": id.to_string() })))
                    }
                    Err(e) => Ok(err_result(e.to_string())),
                }
            }
            other => Err(McpError::ToolNotFound(other.to_string())),
        }
    }
}

fn parse_id(args: &Value) -> Option<ScheduleId> {
    args.get("id").and_then(Value::as_str).and_then(|s| s.parse().ok())
}
