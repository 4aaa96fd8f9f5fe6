//! `VectorStore` port (`upsert`, `search(top_k, filter)`,
//! `delete`, keyed per bot) plus a `qdrant-client`-backed implementation.
//! `qdrant-client` itself isn't exercised anywhere in the retrieved corpus
//! (only named in other examples' manifests), so the payload marshalling
//! below is written directly against the crate's documented prost-generated
//! `Value`/`Struct` shape rather than lifted from a sibling repo.

use std::collections::HashMap;

use async_trait::async_trait;
use memoh_core::types::BotId;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointId,
    PointStruct, PointsIdsList, PointsSelector, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::error::{MemoryError, Result};
use crate::types::{MemoryMetadata, MemoryRecord};

pub const COLLECTION: &str = "memoh-memory";
const BOT_ID_FIELD: &str = "bot_id";
const CONTENT_FIELD: &str = "content";
const METADATA_FIELD: &str = "metadata";

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_collection(&self, dimensions: u64) -> Result<()>;
    async fn upsert(&self, record: &MemoryRecord) -> Result<()>;
    async fn search(&self, bot_id: BotId, embedding: &[f32], top_k: u64) -> Result<Vec<(MemoryRecord, f32)>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn purge_bot(&self, bot_id: BotId) -> Result<()>;
}

pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    pub fn new(client: Qdrant) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, dimensions: u64) -> Result<()> {
        let exists = self
        .client
        .collection_exists(COLLECTION)
        .await
        .map_err(|e| MemoryError::VectorStore(e.to_string()))?;
        if exists {
            return Ok(());
        }
        self.client
        .create_collection(
            CreateCollectionBuilder::new(COLLECTION)
            .vectors_config(VectorParamsBuilder::new(dimensions, Distance::Cosine)),
        )
        .await
        .map_err(|e| MemoryError::VectorStore(e.to_string()))?;
        Ok(())
    }

    async fn upsert(&self, record: &MemoryRecord) -> Result<()> {
        let payload = record_to_payload(record);
        let point = PointStruct::new(record.id.to_string(), record.embedding.clone(), payload);
        self.client
        .upsert_points(UpsertPointsBuilder::new(COLLECTION, vec![point]))
        .await
        .map_err(|e| MemoryError::VectorStore(e.to_string()))?;
        Ok(())
    }

    async fn search(&self, bot_id: BotId, embedding: &[f32], top_k: u64) -> Result<Vec<(MemoryRecord, f32)>> {
        let filter = bot_filter(bot_id);
        let response = self
        .client
        .search_points(
            SearchPointsBuilder::new(COLLECTION, embedding.to_vec(), top_k)
            .filter(filter)
            .with_payload(true),
        )
        .await
        .map_err(|e| MemoryError::VectorStore(e.to_string()))?;
        response
        .result
        .iter()
        .map(|scored| point_to_record(scored).map(|rec| (rec, scored.score)))
        .collect()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let selector = PointsSelector {
            points_selector_one_of: Some(qdrant_client::qdrant::points_selector::PointsSelectorOneOf::Points(
                    PointsIdsList {
                        ids: vec![PointId {
                                point_id_options: Some(PointIdOptions::Uuid(id.to_string())),
                        }],
                    },
            )),
        };
        self.client
        .delete_points(DeletePointsBuilder::new(COLLECTION).points(selector))
        .await
        .map_err(|e| MemoryError::VectorStore(e.to_string()))?;
        Ok(())
    }

    async fn purge_bot(&self, bot_id: BotId) -> Result<()> {
        let filter = bot_filter(bot_id);
        let selector = PointsSelector {
            points_selector_one_of: Some(qdrant_client::qdrant::points_selector::PointsSelectorOneOf::Filter(filter)),
        };
        self.client
        .delete_points(DeletePointsBuilder::new(COLLECTION).points(selector))
        .await
        .map_err(|e| MemoryError::VectorStore(e.to_string()))?;
        Ok(())
    }
}

fn bot_filter(bot_id: BotId) -> Filter {
    Filter::must([Condition::matches(BOT_ID_FIELD, bot_id.to_string())])
}

fn record_to_payload(record: &MemoryRecord) -> Payload {
    let mut map = Map::new();
    map.insert(BOT_ID_FIELD.to_string(), Json::String(record.bot_id.to_string()));
    map.insert(CONTENT_FIELD.to_string(), Json::String(record.content.clone()));
    map.insert(
        METADATA_FIELD.to_string(),
        serde_json::to_value(&record.metadata).unwrap_or(Json::Null),
    );
    json_map_to_payload(&map)
}

fn point_to_record(scored: &ScoredPoint) -> Result<MemoryRecord> {
    let id = match scored.id.as_ref().and_then(|p| p.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(s)) => s
        .parse()
        .map_err(|_| MemoryError::VectorStore(format!("malformed point id: {s}")))?,
        Some(PointIdOptions::Num(n)) => {
            return Err(MemoryError::VectorStore(format!("unexpected numeric point id: {n}")))
        }
        None => return Err(MemoryError::VectorStore("point missing id".to_string())),
    };
    let bot_id: BotId = payload_str(&scored.payload, BOT_ID_FIELD)?
    .parse()
    .map_err(|_| MemoryError::VectorStore("malformed bot_id in payload".to_string()))?;
    let content = payload_str(&scored.payload, CONTENT_FIELD)?;
    let metadata_json = scored
    .payload
    .get(METADATA_FIELD)
    .map(qvalue_to_json)
    .unwrap_or(Json::Null);
    let metadata: MemoryMetadata = serde_json::from_value(metadata_json)
    .map_err(|e| MemoryError::VectorStore(format!("malformed metadata payload: {e}")))?;
    Ok(MemoryRecord {
            id,
            bot_id,
            content,
            embedding: Vec::new(),
            metadata,
    })
}

fn payload_str(payload: &HashMap<String, QValue>, field: &str) -> Result<String> {
    payload
    .get(field)
    .and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
    })
    .ok_or_else(|| MemoryError::VectorStore(format!("missing payload field: {field}")))
}

fn json_map_to_payload(map: &Map<String, Json>) -> Payload {
    let mut fields = HashMap::new();
    for (k, v) in map {
        fields.insert(k.clone(), json_to_qvalue(v));
    }
    Payload::from(fields)
}

fn json_to_qvalue(v: &Json) -> QValue {
    let kind = match v {
        Json::Null => Kind::NullValue(0),
        Json::Bool(b) => Kind::BoolValue(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Kind::IntegerValue(i)
            } else {
                Kind::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => Kind::StringValue(s.clone()),
        other => Kind::StringValue(other.to_string()),
    };
    QValue { kind: Some(kind) }
}

fn qvalue_to_json(v: &QValue) -> Json {
    match &v.kind {
        Some(Kind::NullValue(_)) | None => Json::Null,
        Some(Kind::BoolValue(b)) => Json::Bool(*b),
        Some(Kind::IntegerValue(i)) => Json::Number((*i).into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(*d).map(Json::Number).unwrap_or(Json::Null),
        Some(Kind::StringValue(s)) => serde_json::from_str(s).unwrap_or_else(|_| Json::String(s.clone())),
        Some(Kind::ListValue(_)) | Some(Kind::StructValue(_)) => Json::Null,
    }
}
