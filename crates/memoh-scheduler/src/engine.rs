//! Cron-driven job engine : one Tokio timer per enabled schedule,
//! firing a synthetic agent turn through [`memoh_agent::TurnEngine`] and
//! enforcing `max_calls` atomically with the firing.
//!
//! Generalizes `SchedulerEngine` (a single 1s polling loop over
//! a SQLite `jobs` table, `compute_next_run`'s hand-rolled Once/Interval/
//! Daily/Weekly match) into one Tokio task per Postgres-backed `Schedule`
//! row, driven by real cron expressions via the `cron` crate instead of a
//! bespoke schedule-kind enum — the design only ever names a single `pattern
//! (cron)` field, not five schedule kinds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures_util::StreamExt;
use memoh_agent::TurnEngine;
use memoh_core::types::{BotId, ScheduleId};
use memoh_db::PgPool;
use memoh_mcp::provider::SessionContext;
use memoh_protocol::agent_event::{AllowedAction, TurnInput};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::pattern;

/// Every schedule fires with the full action set enabled — a scheduled
/// command is system-attributed and trusted, unlike an inbound chat turn
/// whose `allowed_actions` a caller restricts.
const SCHEDULED_ACTIONS: &[AllowedAction] = &[
    AllowedAction::Web,
    AllowedAction::Subagent,
    AllowedAction::Skill,
    AllowedAction::Container,
    AllowedAction::Memory,
    AllowedAction::Messaging,
    AllowedAction::McpExternal,
    AllowedAction::Schedule,
];

/// Drives every enabled [`memoh_db::model::Schedule`] to completion on its
/// own timer. Cheap to clone (an `Arc` around shared state); the gateway
/// holds one instance for the lifetime of the process.
pub struct SchedulerEngine {
    pool: PgPool,
    agent: Arc<TurnEngine>,
    /// One cancellation token per armed timer, keyed by schedule id — CRUD
    /// mutations cancel the old token before arming a fresh one (/// "CRUD mutations reload the affected timer transactionally").
    timers: DashMap<ScheduleId, CancellationToken>,
}

impl SchedulerEngine {
    pub fn new(pool: PgPool, agent: Arc<TurnEngine>) -> Arc<Self> {
        Arc::new(Self {
                pool,
                agent,
                timers: DashMap::new(),
        })
    }

    /// Enumerates every enabled schedule, parses its cron pattern, and arms
    /// a timer for it. A pattern that fails to parse is logged and the
    /// schedule is left disabled rather than blocking the rest of the sweep
    /// ("Invalid patterns log a warning and leave the schedule
    /// disabled").
    pub async fn bootstrap(self: &Arc<Self>) -> Result<()> {
        let schedules = memoh_db::schedules::list_enabled(&self.pool).await?;
        info!(count = schedules.len(), "scheduler bootstrap: enabled schedules found");
        for schedule in schedules {
            match pattern::parse(&schedule.cron_pattern) {
                Ok(parsed) => {
                    let now = Utc::now();
                    let next = schedule
                    .next_run_at
                    .filter(|at| *at > now)
                    .or_else(|| pattern::next_fire_after(&parsed, now));
                    match next {
                        Some(at) => self.arm(schedule.id, at),
                        None => {
                            warn!(schedule_id = %schedule.id, "no future occurrence; leaving unarmed");
                        }
                    }
                }
                Err(e) => {
                    warn!(schedule_id = %schedule.id, pattern = %schedule.cron_pattern, error = %e, "invalid cron pattern on bootstrap");
                    let _ = memoh_db::schedules::update(&self.pool, schedule.id, None, None, Some(false)).await;
                }
            }
        }
        Ok(())
    }

    /// Re-reads `schedule_id` from the database and re-arms (or stops) its
    /// timer accordingly. Called after every create/update/enable/disable
    /// mutation so the in-memory timer set never drifts from persisted
    /// state.
    pub async fn reload(self: &Arc<Self>, schedule_id: ScheduleId) -> Result<()> {
        self.stop(schedule_id);
        let schedule = match memoh_db::schedules::get(&self.pool, schedule_id).await {
            Ok(s) => s,
            Err(memoh_db::DbError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if !schedule.enabled {
            return Ok(());
        }
        if schedule.max_calls.is_some_and(|m| schedule.current_calls >= m) {
            return Ok(());
        }
        let parsed = pattern::parse(&schedule.cron_pattern)?;
        let now = Utc::now();
        let next = schedule
        .next_run_at
        .filter(|at| *at > now)
        .or_else(|| pattern::next_fire_after(&parsed, now));
        if let Some(at) = next {
            self.arm(schedule_id, at);
        }
        Ok(())
    }

    /// Cancels `schedule_id`'s timer, if one is armed. Idempotent.
    pub fn stop(&self, schedule_id: ScheduleId) {
        if let Some((_, token)) = self.timers.remove(&schedule_id) {
            token.cancel();
        }
    }

    /// Cancels every armed timer. Called during shutdown ("a
    /// global shutdown cancels the root context; subsystems drain in
    /// reverse dependency order").
    pub fn stop_all(&self) {
        for entry in self.timers.iter() {
            entry.value().cancel();
        }
        self.timers.clear();
    }

    fn arm(self: &Arc<Self>, schedule_id: ScheduleId, fire_at: chrono::DateTime<Utc>) {
        let token = CancellationToken::new();
        self.timers.insert(schedule_id, token.clone());
        let engine = Arc::clone(self);
        tokio::spawn(async move {
                let now = Utc::now();
                let delay = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        engine.fire(schedule_id).await;
                    }
                    _ = token.cancelled() => {}
                }
        });
    }

    /// Fires one schedule: re-checks `max_calls` against the freshest row
    /// (another process may have mutated it since the timer was armed),
    /// submits a synthetic turn, records the run, and re-arms the next
    /// occurrence. No retry on failure — "the next scheduled
    /// tick is the only recovery".
    async fn fire(self: Arc<Self>, schedule_id: ScheduleId) {
        let schedule = match memoh_db::schedules::get(&self.pool, schedule_id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(schedule_id = %schedule_id, error = %e, "schedule vanished before firing");
                return;
            }
        };
        if !schedule.enabled {
            return;
        }
        if let Some(max) = schedule.max_calls {
            if schedule.current_calls >= max {
                let _ = memoh_db::schedules::update(&self.pool, schedule_id, None, None, Some(false)).await;
                self.stop(schedule_id);
                info!(schedule_id = %schedule_id, "max_calls reached; schedule disabled");
                return;
            }
        }

        if let Err(e) = self.submit_turn(schedule.bot_id, &schedule.command).await {
            error!(schedule_id = %schedule_id, error = %e, "scheduled turn failed");
        }

        let now = Utc::now();
        let next = pattern::parse(&schedule.cron_pattern)
        .ok()
        .and_then(|p| pattern::next_fire_after(&p, now));
        match memoh_db::schedules::record_run(&self.pool, schedule_id, now, next).await {
            Ok(updated) => {
                if let Some(at) = next {
                    if !updated.max_calls.is_some_and(|m| updated.current_calls >= m) {
                        self.arm(schedule_id, at);
                    }
                }
            }
            Err(e) => error!(schedule_id = %schedule_id, error = %e, "failed to record schedule run"),
        }
    }

    /// Builds a synthetic `TurnInput` from the schedule's `command` and
    /// drains the agent's event stream to completion. The scheduler itself
    /// never inspects the events — `message.send` inside the turn is the
    /// tool the model uses to actually deliver anything ("a
    /// system-attributed sender, and the schedule metadata in headers").
    async fn submit_turn(&self, bot_id: BotId, command: &serde_json::Value) -> Result<()> {
        let query = command
        .as_str()
        .map(str::to_string)
        .or_else(|| command.get("query").and_then(|v| v.as_str()).map(str::to_string))
        .unwrap_or_else(|| command.to_string());

        let model_id = memoh_db::bots::model_enabled_as(&self.pool, bot_id, memoh_core::types::EnableAs::Chat)
        .await?
        .ok_or_else(|| {
                memoh_db::DbError::NotFound(format!("bot {bot_id} has no chat model enabled"))
        })?;

        let turn = TurnInput {
            model_ref: model_id.to_string(),
            active_context_minutes: 60,
            platforms: vec!["schedule".to_string()],
            current_platform: "schedule".to_string(),
            allowed_actions: SCHEDULED_ACTIONS.to_vec(),
            messages: Vec::new(),
            skills: Vec::new(),
            query,
            identity: serde_json::json!({ "kind": "schedule" }),
            attachments: Vec::new(),
        };
        let ctx = SessionContext {
            bot_id,
            current_platform: "schedule".to_string(),
            reply_target: String::new(),
            channel_identity_id: None,
            user_id: None,
        };

        let mut stream = Box::pin(self.agent.clone().stream(ctx, turn, CancellationToken::new()));
        while let Some(event) = stream.next().await {
            if let memoh_protocol::agent_event::AgentEvent::ProcessingFailed { error } = event {
                warn!(%error, "scheduled turn reported failure");
            }
        }
        Ok(())
    }
}
