use chrono::{DateTime, Utc};
use memoh_core::types::BotId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single long-term memory entry (the design `MemoryRecord`). The vector
/// store owns the source of truth for the record itself (content +
/// metadata live in its payload); the BM25 index only ever sees `(id,
/// content)` pairs for scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub bot_id: BotId,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: MemoryMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub source_turn: Option<String>,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A candidate fact mined by `Extract` from a conversation turn window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFact {
    pub content: String,
    pub confidence: f32,
}

/// The action `Decide` chooses for one candidate fact, per the design.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Add,
    Update { id: Uuid },
    Delete { id: Uuid },
    None,
}

/// One role-tagged message in the turn window handed to `Extract`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: String,
    pub content: String,
}

/// Optional metadata filters accepted by `Search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub source_turn: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryHit {
    pub id: Uuid,
    pub content: String,
    pub score: f32,
    pub metadata: MemoryMetadata,
}
