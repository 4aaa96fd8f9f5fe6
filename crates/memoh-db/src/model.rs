//! Row structs mirror the migrations column-for-column so `sqlx::query_as`
//! can decode them directly; the `From<…Row> for …` impls are where raw
//! columns (`TEXT`, `Uuid`) become the typed domain values the rest of the
//! workspace imports from this crate.

use chrono::{DateTime, Utc};
use memoh_core::types::{
    BotId, BotType, ChannelIdentityId, ChannelName, ClientType, ContainerId, ContainerVersionId,
    ConversationId, EnableAs, LlmProviderId, Modality, ModelId, ModelKind, ParticipantRole,
    RouteId, ScheduleId, SnapshotId, SubagentId, UserId,
};
use serde_json::Value as Json;
use sqlx::FromRow;
use uuid::Uuid;

fn parse_or<T: std::str::FromStr>(s: &str, what: &'static str) -> T
where
T::Err: std::fmt::Debug,
{
    s.parse()
    .unwrap_or_else(|e| panic!("corrupt `{what}` column value {s:?}: {e:?}"))
}

// ---------------------------------------------------------------------- Bot

#[derive(Debug, Clone)]
pub struct Bot {
    pub id: BotId,
    pub owner_user_id: UserId,
    pub bot_type: BotType,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub metadata: Json,
    pub max_context_tokens: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct BotRow {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub bot_type: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub metadata: Json,
    pub max_context_tokens: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BotRow> for Bot {
    fn from(r: BotRow) -> Self {
        Bot {
            id: r.id.into(),
            owner_user_id: r.owner_user_id.into(),
            bot_type: match r.bot_type.as_str() {
                "personal" => BotType::Personal,
                _ => BotType::Public,
            },
            display_name: r.display_name,
            avatar_url: r.avatar_url,
            is_active: r.is_active,
            metadata: r.metadata,
            max_context_tokens: r.max_context_tokens,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub(crate) fn bot_type_str(t: BotType) -> &'static str {
    match t {
        BotType::Personal => "personal",
        BotType::Public => "public",
    }
}

// --------------------------------------------------------------------- User

/// Platform account behind `/auth/login`. Deliberately thin: this
/// carries only what `owner_user_id`/login actually need, not a
/// quota/approval/content-filter profile system.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id.into(),
            username: r.username,
            password_hash: r.password_hash,
            display_name: r.display_name,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// ---------------------------------------------------------------- Providers

#[derive(Debug, Clone)]
pub struct LlmProvider {
    pub id: LlmProviderId,
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct LlmProviderRow {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LlmProviderRow> for LlmProvider {
    fn from(r: LlmProviderRow) -> Self {
        LlmProvider {
            id: r.id.into(),
            name: r.name,
            base_url: r.base_url,
            api_key: r.api_key,
            metadata: r.metadata,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Model {
    pub id: ModelId,
    pub model_id: String,
    pub name: Option<String>,
    pub provider_id: LlmProviderId,
    pub input_modalities: Vec<Modality>,
    pub model_kind: ModelKind,
    pub dimensions: Option<i32>,
    pub client_type: Option<ClientType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ModelRow {
    pub id: Uuid,
    pub model_id: String,
    pub name: Option<String>,
    pub provider_id: Uuid,
    pub input_modalities: Vec<String>,
    pub model_kind: String,
    pub dimensions: Option<i32>,
    pub client_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ModelRow> for Model {
    fn from(r: ModelRow) -> Self {
        Model {
            id: r.id.into(),
            model_id: r.model_id,
            name: r.name,
            provider_id: r.provider_id.into(),
            input_modalities: r
            .input_modalities
            .iter()
            .map(|m| match m.as_str() {
                    "image" => Modality::Image,
                    _ => Modality::Text,
            })
            .collect(),
            model_kind: match r.model_kind.as_str() {
                "embedding" => ModelKind::Embedding,
                _ => ModelKind::Chat,
            },
            dimensions: r.dimensions,
            client_type: r.client_type.as_deref().map(|c| match c {
                    "openai-completions" => ClientType::OpenaiCompletions,
                    "anthropic-messages" => ClientType::AnthropicMessages,
                    "google-generative-ai" => ClientType::GoogleGenerativeAi,
                    _ => ClientType::OpenaiResponses,
            }),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub(crate) fn model_kind_str(k: ModelKind) -> &'static str {
    match k {
        ModelKind::Chat => "chat",
        ModelKind::Embedding => "embedding",
    }
}

pub(crate) fn client_type_str(c: ClientType) -> &'static str {
    match c {
        ClientType::OpenaiResponses => "openai-responses",
        ClientType::OpenaiCompletions => "openai-completions",
        ClientType::AnthropicMessages => "anthropic-messages",
        ClientType::GoogleGenerativeAi => "google-generative-ai",
    }
}

pub(crate) fn enable_as_str(e: EnableAs) -> &'static str {
    match e {
        EnableAs::Chat => "chat",
        EnableAs::Memory => "memory",
        EnableAs::Embedding => "embedding",
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BotModelLink {
    pub bot_id: BotId,
    pub model_id: ModelId,
    pub enable_as: Option<EnableAs>,
}

// --------------------------------------------------------------- Identities

#[derive(Debug, Clone)]
pub struct ChannelIdentity {
    pub id: ChannelIdentityId,
    pub user_id: Option<UserId>,
    pub channel: ChannelName,
    pub channel_subject_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ChannelIdentityRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub channel: String,
    pub channel_subject_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChannelIdentityRow> for ChannelIdentity {
    fn from(r: ChannelIdentityRow) -> Self {
        ChannelIdentity {
            id: r.id.into(),
            user_id: r.user_id.map(Into::into),
            channel: r.channel,
            channel_subject_id: r.channel_subject_id,
            display_name: r.display_name,
            avatar_url: r.avatar_url,
            metadata: r.metadata,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// ------------------------------------------------------------- Conversation

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKindCol {
    Direct,
    Group,
    Thread,
}

impl ConversationKindCol {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationKindCol::Direct => "direct",
            ConversationKindCol::Group => "group",
            ConversationKindCol::Thread => "thread",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "group" => ConversationKindCol::Group,
            "thread" => ConversationKindCol::Thread,
            _ => ConversationKindCol::Direct,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: ConversationId,
    pub bot_id: BotId,
    pub kind: ConversationKindCol,
    pub parent_conversation_id: Option<ConversationId>,
    pub title: Option<String>,
    pub created_by: UserId,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ConversationRow {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub kind: String,
    pub parent_conversation_id: Option<Uuid>,
    pub title: Option<String>,
    pub created_by: Uuid,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(r: ConversationRow) -> Self {
        Conversation {
            id: r.id.into(),
            bot_id: r.bot_id.into(),
            kind: ConversationKindCol::parse(&r.kind),
            parent_conversation_id: r.parent_conversation_id.map(Into::into),
            title: r.title,
            created_by: r.created_by.into(),
            metadata: r.metadata,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub conversation_id: ConversationId,
    pub channel_identity_id: ChannelIdentityId,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ParticipantRow {
    pub conversation_id: Uuid,
    pub channel_identity_id: Uuid,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl From<ParticipantRow> for Participant {
    fn from(r: ParticipantRow) -> Self {
        Participant {
            conversation_id: r.conversation_id.into(),
            channel_identity_id: r.channel_identity_id.into(),
            role: match r.role.as_str() {
                "owner" => ParticipantRole::Owner,
                "admin" => ParticipantRole::Admin,
                _ => ParticipantRole::Member,
            },
            joined_at: r.joined_at,
        }
    }
}

pub(crate) fn participant_role_str(r: ParticipantRole) -> &'static str {
    match r {
        ParticipantRole::Owner => "owner",
        ParticipantRole::Admin => "admin",
        ParticipantRole::Member => "member",
    }
}

// ------------------------------------------------------------------- Route

#[derive(Debug, Clone)]
pub struct Route {
    pub id: RouteId,
    pub conversation_id: ConversationId,
    pub bot_id: BotId,
    pub channel: ChannelName,
    pub channel_config_id: Option<Uuid>,
    pub external_conversation_id: String,
    pub thread_id: Option<String>,
    pub conversation_type: Option<String>,
    pub reply_target: Option<String>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct RouteRow {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub bot_id: Uuid,
    pub channel: String,
    pub channel_config_id: Option<Uuid>,
    pub external_conversation_id: String,
    pub thread_id: Option<String>,
    pub conversation_type: Option<String>,
    pub reply_target: Option<String>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RouteRow> for Route {
    fn from(r: RouteRow) -> Self {
        Route {
            id: r.id.into(),
            conversation_id: r.conversation_id.into(),
            bot_id: r.bot_id.into(),
            channel: r.channel,
            channel_config_id: r.channel_config_id,
            external_conversation_id: r.external_conversation_id,
            thread_id: r.thread_id,
            conversation_type: r.conversation_type,
            reply_target: r.reply_target,
            metadata: r.metadata,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// ----------------------------------------------------------------- Message

#[derive(Debug, Clone)]
pub struct Message {
    pub id: memoh_core::types::MessageId,
    pub bot_id: BotId,
    pub route_id: Option<RouteId>,
    pub sender_channel_identity_id: Option<ChannelIdentityId>,
    pub sender_user_id: Option<UserId>,
    pub platform: Option<ChannelName>,
    pub external_message_id: Option<String>,
    pub source_reply_to_message_id: Option<memoh_core::types::MessageId>,
    pub role: memoh_core::types::MessageRole,
    pub content: Json,
    pub metadata: Json,
    pub usage: Option<Json>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct MessageRow {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub route_id: Option<Uuid>,
    pub sender_channel_identity_id: Option<Uuid>,
    pub sender_user_id: Option<Uuid>,
    pub platform: Option<String>,
    pub external_message_id: Option<String>,
    pub source_reply_to_message_id: Option<Uuid>,
    pub role: String,
    pub content: Json,
    pub metadata: Json,
    pub usage: Option<Json>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(r: MessageRow) -> Self {
        Message {
            id: r.id.into(),
            bot_id: r.bot_id.into(),
            route_id: r.route_id.map(Into::into),
            sender_channel_identity_id: r.sender_channel_identity_id.map(Into::into),
            sender_user_id: r.sender_user_id.map(Into::into),
            platform: r.platform,
            external_message_id: r.external_message_id,
            source_reply_to_message_id: r.source_reply_to_message_id.map(Into::into),
            role: parse_or(&r.role, "role"),
            content: r.content,
            metadata: r.metadata,
            usage: r.usage,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageAsset {
    pub message_id: memoh_core::types::MessageId,
    pub content_hash: String,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, FromRow)]
pub(crate) struct MessageAssetRow {
    pub message_id: Uuid,
    pub content_hash: String,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

impl From<MessageAssetRow> for MessageAsset {
    fn from(r: MessageAssetRow) -> Self {
        MessageAsset {
            message_id: r.message_id.into(),
            content_hash: r.content_hash,
            mime_type: r.mime_type,
            file_name: r.file_name,
        }
    }
}

// ---------------------------------------------------------------- Schedule

#[derive(Debug, Clone)]
pub struct Schedule {
    pub id: ScheduleId,
    pub bot_id: BotId,
    pub name: String,
    pub description: Option<String>,
    pub cron_pattern: String,
    pub command: Json,
    pub max_calls: Option<i32>,
    pub current_calls: i32,
    pub enabled: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ScheduleRow {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub cron_pattern: String,
    pub command: Json,
    pub max_calls: Option<i32>,
    pub current_calls: i32,
    pub enabled: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScheduleRow> for Schedule {
    fn from(r: ScheduleRow) -> Self {
        Schedule {
            id: r.id.into(),
            bot_id: r.bot_id.into(),
            name: r.name,
            description: r.description,
            cron_pattern: r.cron_pattern,
            command: r.command,
            max_calls: r.max_calls,
            current_calls: r.current_calls,
            enabled: r.enabled,
            next_run_at: r.next_run_at,
            last_run_at: r.last_run_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// --------------------------------------------------------------- Container

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Creating,
    Running,
    Stopped,
    Removed,
}

impl ContainerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerStatus::Creating => "creating",
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Removed => "removed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "running" => ContainerStatus::Running,
            "stopped" => ContainerStatus::Stopped,
            "removed" => ContainerStatus::Removed,
            _ => ContainerStatus::Creating,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Container {
    pub id: ContainerId,
    pub bot_id: BotId,
    pub runtime_ref: Option<String>,
    pub image: String,
    pub status: ContainerStatus,
    pub host_path: String,
    pub metadata: Json,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_stopped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ContainerRow {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub runtime_ref: Option<String>,
    pub image: String,
    pub status: String,
    pub host_path: String,
    pub metadata: Json,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_stopped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ContainerRow> for Container {
    fn from(r: ContainerRow) -> Self {
        Container {
            id: r.id.into(),
            bot_id: r.bot_id.into(),
            runtime_ref: r.runtime_ref,
            image: r.image,
            status: ContainerStatus::parse(&r.status),
            host_path: r.host_path,
            metadata: r.metadata,
            last_started_at: r.last_started_at,
            last_stopped_at: r.last_stopped_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub container_id: ContainerId,
    pub parent_id: Option<SnapshotId>,
    pub label: Option<String>,
    pub archive_path: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct SnapshotRow {
    pub id: Uuid,
    pub container_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub label: Option<String>,
    pub archive_path: String,
    pub created_at: DateTime<Utc>,
}

impl From<SnapshotRow> for Snapshot {
    fn from(r: SnapshotRow) -> Self {
        Snapshot {
            id: r.id.into(),
            container_id: r.container_id.into(),
            parent_id: r.parent_id.map(Into::into),
            label: r.label,
            archive_path: r.archive_path,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContainerVersion {
    pub id: ContainerVersionId,
    pub container_id: ContainerId,
    pub snapshot_id: SnapshotId,
    pub version_number: i32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ContainerVersionRow {
    pub id: Uuid,
    pub container_id: Uuid,
    pub snapshot_id: Uuid,
    pub version_number: i32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ContainerVersionRow> for ContainerVersion {
    fn from(r: ContainerVersionRow) -> Self {
        ContainerVersion {
            id: r.id.into(),
            container_id: r.container_id.into(),
            snapshot_id: r.snapshot_id.into(),
            version_number: r.version_number,
            note: r.note,
            created_at: r.created_at,
        }
    }
}

// ---------------------------------------------------------------- Subagent

#[derive(Debug, Clone)]
pub struct Subagent {
    pub id: SubagentId,
    pub bot_id: BotId,
    pub name: String,
    pub description: Option<String>,
    pub allowed_actions: Json,
    pub system_prompt: Option<String>,
    pub model_id: Option<ModelId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
pub(crate) struct SubagentRow {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub allowed_actions: Json,
    pub system_prompt: Option<String>,
    pub model_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<SubagentRow> for Subagent {
    fn from(r: SubagentRow) -> Self {
        Subagent {
            id: r.id.into(),
            bot_id: r.bot_id.into(),
            name: r.name,
            description: r.description,
            allowed_actions: r.allowed_actions,
            system_prompt: r.system_prompt,
            model_id: r.model_id.map(Into::into),
            created_at: r.created_at,
            updated_at: r.updated_at,
            deleted_at: r.deleted_at,
        }
    }
}

// --------------------------------------------------------- Search provider

/// Backs `/search-providers`; the route is declared but leaves
/// the provider's own shape unspecified, so this carries just enough for
/// `memoh-mcp`'s `web.search` tool to reach an HTTP search backend: a name,
/// an endpoint URL, and an optional bearer key.
#[derive(Debug, Clone)]
pub struct SearchProvider {
    pub id: memoh_core::types::SearchProviderId,
    pub bot_id: BotId,
    pub name: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct SearchProviderRow {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub name: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SearchProviderRow> for SearchProvider {
    fn from(r: SearchProviderRow) -> Self {
        SearchProvider {
            id: r.id.into(),
            bot_id: r.bot_id.into(),
            name: r.name,
            endpoint: r.endpoint,
            api_key: r.api_key,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
