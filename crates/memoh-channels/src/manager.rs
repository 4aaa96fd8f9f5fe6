use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{channel::InboundHandler, connection::Connection, error::ChannelError, registry::ChannelRegistry};

/// Minimum delay between reconnect attempts (seconds).
const BACKOFF_BASE_SECS: u64 = 5;
/// Maximum delay between reconnect attempts (seconds).
const BACKOFF_MAX_SECS: u64 = 300; // 5 minutes
/// Maximum number of reconnect attempts before giving up.
const MAX_ATTEMPTS: u32 = 10;
/// Jitter fraction applied to each delay (±10 %).
const JITTER_FRACTION: f64 = 0.10;

/// Tracks live [`Connection`]s keyed by `"{channel}:{bot_id}"`, on top of the
/// immutable [`ChannelRegistry`]. One bot may run several adapters at once
/// (a Telegram connection and a Feishu connection simultaneously); each gets
/// its own entry so it can be stopped or reconnected independently.
///
/// Connection attempts use exponential backoff with jitter — generalizes the
/// `connect_with_backoff` (originally "reconnect one static
/// channel") to "reconnect any `(channel, bot)` pair on demand", since
/// the `Channel::connect` is parameterised per call, not per adapter.
pub struct ChannelManager {
    registry: Arc<ChannelRegistry>,
    connections: DashMap<String, Connection>,
}

impl ChannelManager {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self {
            registry,
            connections: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    fn key(channel: &str, bot_id: &str) -> String {
        format!("{channel}:{bot_id}")
    }

    /// Connects `channel` for `bot_id` with exponential backoff, replacing
    /// any existing connection for the same key (the old one is stopped
    /// with a short grace period first).
    pub async fn connect(
        &self,
        channel: &str,
        bot_id: &str,
        config: Value,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<(), ChannelError> {
        let key = Self::key(channel, bot_id);
        if let Some((_, old)) = self.connections.remove(&key) {
            old.stop(Duration::from_secs(5)).await;
        }

        let adapter = self.registry.get(channel)?;
        let mut delay_secs = BACKOFF_BASE_SECS;

        for attempt in 1..=MAX_ATTEMPTS {
            match adapter.connect(config.clone(), handler.clone()).await {
                Ok(conn) => {
                    info!(channel, bot_id, attempt, "channel connected");
                    self.connections.insert(key, conn);
                    return Ok(());
                }
                Err(e) if attempt == MAX_ATTEMPTS => {
                    error!(channel, bot_id, attempt, error = %e, "channel connect failed, giving up");
                    return Err(e);
                }
                Err(e) => {
                    let total = delay_secs + jitter_secs(delay_secs);
                    warn!(
                        channel, bot_id, attempt, max = MAX_ATTEMPTS, error = %e,
                        retry_after_secs = total, "channel connect failed, retrying"
                    );
                    sleep(Duration::from_secs(total)).await;
                    delay_secs = (delay_secs * 2).min(BACKOFF_MAX_SECS);
                }
            }
        }
        unreachable!("backoff loop exited without returning")
    }

    pub async fn stop(&self, channel: &str, bot_id: &str, grace: Duration) {
        let key = Self::key(channel, bot_id);
        if let Some((_, conn)) = self.connections.remove(&key) {
            conn.stop(grace).await;
        }
    }

    /// Stops every live connection in parallel, honouring each connection's
    /// grace period (the design: "subsystems drain in reverse dependency order").
    pub async fn stop_all(&self, grace: Duration) {
        let keys: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((_, conn)) = self.connections.remove(&key) {
                handles.push(tokio::spawn(async move { conn.stop(grace).await }));
            }
        }
        for h in handles {
            let _ = h.await;
        }
    }

    pub fn is_connected(&self, channel: &str, bot_id: &str) -> bool {
        self.connections.contains_key(&Self::key(channel, bot_id))
    }
}

async fn sleep(d: Duration) {
    tokio::time::sleep(d).await
}

/// Return a jitter offset (0 … `JITTER_FRACTION * base_secs`) as integer seconds.
///
/// Uses a simple deterministic pseudo-random value derived from the current
/// monotonic timestamp, avoiding a rand dependency.
fn jitter_secs(base_secs: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .map(|d| d.subsec_nanos())
    .unwrap_or(0);

    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}
