//! Internal event hub : `message_created{bot_id, message}`
//! fans out to whoever is listening — today, the gateway's
//! `GET /bots/{id}/messages/events` SSE handler. Delivery is best-effort: a
//! `broadcast` channel drops the oldest event for a lagging subscriber
//! rather than blocking the router, and the design explicitly allows this
//! ("lost events are recovered on next poll by consumers via `ListSince`").

use dashmap::DashMap;
use memoh_core::types::BotId;
use memoh_protocol::stream_event::MessageStreamEvent;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

pub struct EventHub {
    channels: DashMap<BotId, broadcast::Sender<MessageStreamEvent>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    pub fn subscribe(&self, bot_id: BotId) -> broadcast::Receiver<MessageStreamEvent> {
        self.channels
        .entry(bot_id)
        .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
        .subscribe()
    }

    /// Best-effort publish: a `SendError` here just means nobody is
    /// subscribed right now, which is not an error condition.
    pub fn publish(&self, bot_id: BotId, event: MessageStreamEvent) {
        let sender = self
        .channels
        .entry(bot_id)
        .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        let _ = sender.send(event);
    }
}
