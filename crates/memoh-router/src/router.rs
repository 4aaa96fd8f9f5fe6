//! Inbound router : turns a channel adapter's raw `InboundMessage`
//! into a persisted conversation turn and a best-effort dispatch to the
//! agent. Four steps, in order: resolve the sender's identity, resolve (or
//! create) the conversation/route, persist the message idempotently, then
//! hand off to the dispatch pool and publish on the event hub.
//!
//! Implements [`memoh_channels::channel::InboundHandler`] directly, so a
//! `ChannelManager::connect` call can hand adapters an `Arc<InboundRouter>`
//! with no further glue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use memoh_agent::TurnEngine;
use memoh_channels::channel::InboundHandler;
use memoh_channels::types::InboundMessage;
use memoh_core::types::{BotId, ChannelIdentityId, ConversationId, ParticipantRole, UserId};
use memoh_db::model::ConversationKindCol;
use memoh_db::PgPool;
use memoh_mcp::provider::SessionContext;
use memoh_protocol::agent_event::TurnInput;
use memoh_protocol::stream_event::MessageStreamEvent;
use tokio::sync::Mutex;
use tracing::warn;

use crate::dispatch::{self, DispatchJob, DispatchPool};
use crate::error::Result;
use crate::hub::EventHub;

/// Retries around the message-persistence step only: the design says
/// "persistence errors are retried (N=3, exponential backoff); identity and
/// route resolution errors abort the message with a logged warning" — an
/// unresolvable identity/route has no sensible retry, but a transient DB
/// hiccup on the insert itself does.
const PERSIST_RETRIES: u32 = 3;
const PERSIST_BACKOFF_BASE_MS: u64 = 100;

/// Routes inbound channel traffic for one platform into persisted
/// conversations and, from there, into the agent. One instance is shared
/// across every bot/channel pair — per-route serialization happens via
/// `route_locks`, not per-bot sharding.
pub struct InboundRouter {
    pool: PgPool,
    hub: Arc<EventHub>,
    dispatch: DispatchPool,
    /// Serializes concurrent first-contact route creation for the same
    /// `(bot, channel, external_conversation_id, thread_id)` key so two
    /// racing webhook deliveries don't each create their own conversation.
    /// In-process only — cross-process races are an accepted risk the design
    /// is silent on, same as the idempotent-insert races `memoh-db` already
    /// tolerates via `ON CONFLICT`.
    route_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InboundRouter {
    pub fn new(pool: PgPool, agent: Arc<TurnEngine>) -> Arc<Self> {
        Arc::new(Self {
                pool,
                hub: Arc::new(EventHub::new()),
                dispatch: DispatchPool::new(agent),
                route_locks: DashMap::new(),
        })
    }

    pub fn events(&self) -> Arc<EventHub> {
        Arc::clone(&self.hub)
    }

    /// The full four-step pipeline for one inbound message belonging to `bot_id`.
    pub async fn route(&self, bot_id: BotId, msg: InboundMessage) {
        let identity = match memoh_db::identities::resolve_or_create(
            &self.pool,
            &msg.sender.channel,
            &msg.sender.external_id,
            msg.sender.display_name.as_deref(),
        )
        .await
        {
            Ok(identity) => identity,
            Err(e) => {
                warn!(%bot_id, channel = %msg.channel, error = %e, "identity resolution failed, dropping message");
                return;
            }
        };

        let route = match self.resolve_route(bot_id, &msg, identity.id).await {
            Ok(route) => route,
            Err(e) => {
                warn!(%bot_id, channel = %msg.channel, error = %e, "route resolution failed, dropping message");
                return;
            }
        };

        let message = match self.persist_with_retry(bot_id, &msg, route.id, identity.id, identity.user_id).await {
            Ok(message) => message,
            Err(e) => {
                warn!(%bot_id, channel = %msg.channel, error = %e, "message persistence failed after retries, dropping message");
                return;
            }
        };

        self.hub.publish(
            bot_id,
            MessageStreamEvent::MessageCreated {
                message_id: message.id.to_string(),
                content: message.content.clone(),
            },
        );

        let model_id = match memoh_db::bots::model_enabled_as(&self.pool, bot_id, memoh_core::types::EnableAs::Chat).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!(%bot_id, "no chat model enabled, message persisted but not dispatched");
                return;
            }
            Err(e) => {
                warn!(%bot_id, error = %e, "failed to resolve chat model, message persisted but not dispatched");
                return;
            }
        };

        let turn = TurnInput {
            model_ref: model_id.to_string(),
            active_context_minutes: 60,
            platforms: vec![msg.channel.clone()],
            current_platform: msg.channel.clone(),
            allowed_actions: dispatch::channel_actions(),
            messages: Vec::new(),
            skills: Vec::new(),
            query: extract_text(&msg.message),
            identity: serde_json::json!({
                    "channel": msg.channel,
                    "external_id": msg.sender.external_id,
                    "channel_identity_id": identity.id.to_string(),
            }),
            attachments: Vec::new(),
        };
        let ctx = SessionContext {
            bot_id,
            current_platform: msg.channel.clone(),
            reply_target: msg.reply_target.clone(),
            channel_identity_id: Some(identity.id),
            user_id: identity.user_id,
        };
        self.dispatch.submit(bot_id, DispatchJob { ctx, turn });
    }

    /// Step 2: resolves the route for `msg`'s conversation, creating a new
    /// conversation + route on first contact. Threads look up their parent
    /// (`thread_id = None` on the same `external_conversation_id`) to
    /// inherit participants; groups and direct conversations attribute
    /// creation to the bot owner, falling back to the sender's linked user
    /// when the bot owner lookup is the less natural attribution for a 1:1
    /// conversation (direct conversations aren't called out separately;
    /// this mirrors the "bot owner, fallback sender" rule given
    /// for groups).
    async fn resolve_route(
        &self,
        bot_id: BotId,
        msg: &InboundMessage,
        sender_identity_id: ChannelIdentityId,
    ) -> Result<memoh_db::model::Route> {
        if let Some(route) = memoh_db::routes::find(
            &self.pool,
            bot_id,
            &msg.channel,
            &msg.conversation.external_conversation_id,
            msg.conversation.thread_id.as_deref(),
        )
        .await?
        {
            if !memoh_db::conversations::is_participant(&self.pool, route.conversation_id, sender_identity_id).await? {
                memoh_db::conversations::add_participant(
                    &self.pool,
                    route.conversation_id,
                    sender_identity_id,
                    ParticipantRole::Member,
                )
                .await?;
            }
            memoh_db::routes::set_reply_target(&self.pool, route.id, &msg.reply_target).await?;
            return Ok(route);
        }

        let lock_key = format!(
            "{bot_id}:{}:{}:{}",
            msg.channel,
            msg.conversation.external_conversation_id,
            msg.conversation.thread_id.as_deref().unwrap_or(""),
        );
        let lock = self
        .route_locks
        .entry(lock_key)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
        let _guard = lock.lock().await;

        if let Some(route) = memoh_db::routes::find(
            &self.pool,
            bot_id,
            &msg.channel,
            &msg.conversation.external_conversation_id,
            msg.conversation.thread_id.as_deref(),
        )
        .await?
        {
            return Ok(route);
        }

        let kind = if msg.conversation.thread_id.is_some() {
            ConversationKindCol::Thread
        } else {
            match msg.conversation.conversation_type.as_deref() {
                Some("group") | Some("channel") => ConversationKindCol::Group,
                _ => ConversationKindCol::Direct,
            }
        };

        let parent = if kind == ConversationKindCol::Thread {
            memoh_db::routes::find(&self.pool, bot_id, &msg.channel, &msg.conversation.external_conversation_id, None).await?
        } else {
            None
        };

        let bot = memoh_db::bots::get(&self.pool, bot_id).await?;
        let created_by: UserId = match kind {
            ConversationKindCol::Group => bot.owner_user_id,
            _ => memoh_db::identities::get(&self.pool, sender_identity_id)
            .await?
            .user_id
            .unwrap_or(bot.owner_user_id),
        };

        let parent_conversation_id: Option<ConversationId> = parent.as_ref().map(|r| r.conversation_id);
        let conversation = memoh_db::conversations::create(&self.pool, bot_id, kind, parent_conversation_id, None, created_by).await?;

        if let Some(parent_route) = &parent {
            for participant in memoh_db::conversations::list_participants(&self.pool, parent_route.conversation_id).await? {
                memoh_db::conversations::add_participant(&self.pool, conversation.id, participant.channel_identity_id, participant.role).await?;
            }
        }

        let route = memoh_db::routes::find_or_create(
            &self.pool,
            bot_id,
            &msg.channel,
            &msg.conversation.external_conversation_id,
            msg.conversation.thread_id.as_deref(),
            conversation.id,
        )
        .await?;
        memoh_db::routes::set_reply_target(&self.pool, route.id, &msg.reply_target).await?;

        memoh_db::conversations::add_participant(&self.pool, conversation.id, sender_identity_id, ParticipantRole::Member).await?;

        Ok(route)
    }

    /// Step 3: persists the message with up to `PERSIST_RETRIES` attempts,
    /// exponential backoff between them. Attachments present on the raw
    /// payload are recorded as soft asset links (content-hash keyed); their
    /// bytes are someone else's problem ("binary content written
    /// by a separate collaborator").
    async fn persist_with_retry(
        &self,
        bot_id: BotId,
        msg: &InboundMessage,
        route_id: memoh_core::types::RouteId,
        sender_identity_id: ChannelIdentityId,
        sender_user_id: Option<UserId>,
    ) -> Result<memoh_db::model::Message> {
        let content = msg.message.clone();
        let new = memoh_db::messages::NewMessage {
            route_id: Some(route_id),
            sender_channel_identity_id: Some(sender_identity_id),
            sender_user_id,
            platform: Some(msg.channel.clone()),
            external_message_id: msg.external_message_id.clone(),
            source_reply_to_message_id: None,
            usage: None,
        };

        let mut attempt = 0;
        loop {
            match memoh_db::messages::insert(
                &self.pool,
                bot_id,
                memoh_core::types::MessageRole::User,
                content.clone(),
                serde_json::json!({}),
                new.clone(),
            )
            .await
            {
                Ok(message) => {
                    self.persist_attachments(&msg.message, message.id).await;
                    return Ok(message);
                }
                Err(e) if attempt + 1 < PERSIST_RETRIES => {
                    attempt += 1;
                    let backoff = PERSIST_BACKOFF_BASE_MS * 2u64.pow(attempt - 1);
                    warn!(%bot_id, attempt, error = %e, "message insert failed, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn persist_attachments(&self, raw: &serde_json::Value, message_id: memoh_core::types::MessageId) {
        let Some(attachments) = raw.get("attachments").and_then(|v| v.as_array()) else {
            return;
        };
        for attachment in attachments {
            let Some(content_hash) = attachment.get("content_hash").and_then(|v| v.as_str()) else {
                continue;
            };
            let mime_type = attachment.get("mime_type").and_then(|v| v.as_str());
            let file_name = attachment.get("file_name").and_then(|v| v.as_str());
            if let Err(e) = memoh_db::messages::add_asset(&self.pool, message_id, content_hash, mime_type, file_name).await {
                warn!(%message_id, content_hash, error = %e, "failed to record message attachment");
            }
        }
    }
}

/// Pulls a plain-text query out of an adapter's raw message payload: the
/// `text` field if present, else the whole payload stringified. Adapters
/// that want richer turn input (multiple content blocks) populate
/// `InboundMessage.source` instead; the router's synthetic turn only needs
/// a `query` string today; no richer shape is defined yet.
fn extract_text(message: &serde_json::Value) -> String {
    message
    .get("text")
    .and_then(|v| v.as_str())
    .map(str::to_string)
    .or_else(|| message.as_str().map(str::to_string))
    .unwrap_or_else(|| message.to_string())
}

/// A `(router, bot_id)` pair bound into an `Arc<dyn InboundHandler>` — what
/// `ChannelManager::connect` actually receives. `InboundRouter` itself stays
/// bot-agnostic so one instance (one event hub, one dispatch pool registry)
/// serves every bot.
pub struct BotRouter {
    router: Arc<InboundRouter>,
    bot_id: BotId,
}

impl BotRouter {
    pub fn new(router: Arc<InboundRouter>, bot_id: BotId) -> Arc<Self> {
        Arc::new(Self { router, bot_id })
    }
}

#[async_trait]
impl InboundHandler for BotRouter {
    async fn handle(&self, msg: InboundMessage) {
        self.router.route(self.bot_id, msg).await;
    }
}
