//! Per-bot dispatch worker pool : "long-running agent work
//! is *not* performed in the router's goroutine; a worker pool per bot picks
//! up dispatch work." One bounded queue + one worker task per bot, spawned
//! lazily on first use — generalizes `memoh-channels::ChannelManager`'s
//! `DashMap<key, _>` + lazy-connect idiom from "one connection per
//! `(channel, bot)`" to "one serial worker per bot".
//!
//! Turns are fire-and-forget from the router's perspective: a turn's own
//! `message.send` tool call is what actually delivers the reply. Dispatch
//! failures are logged, never propagated back to the inbound handler —
//! dispatch is best-effort.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::StreamExt;
use memoh_agent::TurnEngine;
use memoh_core::types::BotId;
use memoh_mcp::provider::SessionContext;
use memoh_protocol::agent_event::{AgentEvent, AllowedAction, TurnInput};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Everything a dispatch worker needs to run a turn on behalf of an inbound
/// channel message.
pub struct DispatchJob {
    pub ctx: SessionContext,
    pub turn: TurnInput,
}

const QUEUE_DEPTH: usize = 256;

/// Default action set for channel-originated turns: every adapter routed
/// through here belongs to a bot the owner already configured, so — unlike
/// an interactive `/chat` caller, who names `allowed_actions` explicitly in
/// `ChatRequest` — the router grants the full set and relies on the tool
/// plane / container sandboxing for the actual blast-radius limit.
const CHANNEL_ACTIONS: &[AllowedAction] = &[
    AllowedAction::Web,
    AllowedAction::Subagent,
    AllowedAction::Skill,
    AllowedAction::Container,
    AllowedAction::Memory,
    AllowedAction::Messaging,
    AllowedAction::McpExternal,
];

pub fn channel_actions() -> Vec<AllowedAction> {
    CHANNEL_ACTIONS.to_vec()
}

pub struct DispatchPool {
    agent: Arc<TurnEngine>,
    workers: DashMap<BotId, mpsc::Sender<DispatchJob>>,
}

impl DispatchPool {
    pub fn new(agent: Arc<TurnEngine>) -> Self {
        Self {
            agent,
            workers: DashMap::new(),
        }
    }

    /// Enqueues a job for `bot_id`, spawning its worker task on first use.
    /// A full queue drops the job with a warning rather than blocking the
    /// router's inbound-handling path.
    pub fn submit(&self, bot_id: BotId, job: DispatchJob) {
        let sender = self
        .workers
        .entry(bot_id)
        .or_insert_with(|| self.spawn_worker(bot_id))
        .clone();
        if let Err(e) = sender.try_send(job) {
            warn!(%bot_id, "dispatch queue full or closed, dropping turn: {e}");
        }
    }

    fn spawn_worker(&self, bot_id: BotId) -> mpsc::Sender<DispatchJob> {
        let (tx, mut rx) = mpsc::channel::<DispatchJob>(QUEUE_DEPTH);
        let agent = Arc::clone(&self.agent);
        tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    let mut stream = Box::pin(agent.clone().stream(job.ctx, job.turn, CancellationToken::new()));
                    while let Some(event) = stream.next().await {
                        if let AgentEvent::ProcessingFailed { error } = event {
                            warn!(%bot_id, %error, "dispatched turn failed");
                        }
                    }
                }
        });
        tx
    }
}
