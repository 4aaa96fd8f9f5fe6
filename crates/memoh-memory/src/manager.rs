//! `MemoryEngine` — the Extract/Decide reconciliation pipeline and hybrid
//! search surface of the design. One instance is shared across all bots in
//! the process; per-`bot_id` reconciliation is serialised via a
//! `dashmap`-backed registry of `tokio::sync::Mutex`es (generalizing the
//! `UserResolver` per-key cache-eviction `DashMap` idiom to a
//! mutex-per-key concurrency gate instead of a cache), so at most one
//! reconciliation is in flight per bot while different bots reconcile in
//! parallel (the concurrency invariant).

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use memoh_core::types::BotId;
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;
use uuid::Uuid;

use crate::bm25_index::Bm25Index;
use crate::embed::Embedder;
use crate::error::{MemoryError, Result};
use crate::llm::MemoryLlm;
use crate::types::{Decision, MemoryHit, MemoryMetadata, MemoryRecord, SearchFilter, TurnMessage};
use crate::vector::VectorStore;

/// Facts below this confidence are dropped before `Decide` ever sees them
///.
const EXTRACT_CONFIDENCE_THRESHOLD: f32 = 0.3;
/// Existing-record candidates considered per fact during `Decide`.
const DECIDE_TOP_K: u64 = 10;
/// Default `top_k` for the `memory.search` tool surface.
const SEARCH_DEFAULT_TOP_K: u64 = 10;
/// Hybrid score weight: `score = α·cosine + (1-α)·bm25_norm`.
const HYBRID_ALPHA: f32 = 0.7;

/// One bot's in-memory BM25 index plus a lazily-populated flag so the first
/// touch in a process lifetime rebuilds it from whatever the vector half
/// surfaces, rather than a full corpus scan.
struct BotIndex {
    bm25: AsyncMutex<Bm25Index>,
    loaded: std::sync::atomic::AtomicBool,
}

impl BotIndex {
    fn empty() -> Self {
        Self {
            bm25: AsyncMutex::new(Bm25Index::new()),
            loaded: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

pub struct MemoryEngine {
    llm: Arc<dyn MemoryLlm>,
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorStore>,
    /// One lock per bot gates reconciliation concurrency; additional
    /// reconciliations for the same bot simply await the lock rather than
    /// failing, matching the "additional reconciliations enqueue".
    reconcile_locks: DashMap<BotId, Arc<AsyncMutex<()>>>,
    indexes: DashMap<BotId, Arc<BotIndex>>,
}

impl MemoryEngine {
    pub fn new(llm: Arc<dyn MemoryLlm>, embedder: Arc<dyn Embedder>, vectors: Arc<dyn VectorStore>) -> Self {
        Self {
            llm,
            embedder,
            vectors,
            reconcile_locks: DashMap::new(),
            indexes: DashMap::new(),
        }
    }

    async fn ensure_collection(&self) -> Result<()> {
        self.vectors.ensure_collection(self.embedder.dimensions() as u64).await
    }

    fn lock_for(&self, bot_id: BotId) -> Arc<AsyncMutex<()>> {
        self.reconcile_locks.entry(bot_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    fn index_for(&self, bot_id: BotId) -> Arc<BotIndex> {
        self.indexes.entry(bot_id).or_insert_with(|| Arc::new(BotIndex::empty())).clone()
    }

    /// Mines facts from a turn window via the memory-designated chat model,
    /// then reconciles each surviving candidate into the vector store and
    /// BM25 index. Returns the applied decisions (for logging/testing);
    /// malformed LLM output is tolerated elsewhere — `extract`/`decide`
    /// implementations skip unparsable lines with a warning rather than
    /// erroring the whole turn.
    pub async fn reconcile_turn(
        &self,
        bot_id: BotId,
        window: &[TurnMessage],
        source_turn: Option<String>,
    ) -> Result<Vec<Decision>> {
        self.ensure_collection().await?;
        let lock = self.lock_for(bot_id);
        let _guard = lock.lock().await;

        let facts = self.llm.extract(window).await.map_err(MemoryError::Llm)?;
        let mut decisions = Vec::with_capacity(facts.len());
        for fact in facts {
            if fact.confidence < EXTRACT_CONFIDENCE_THRESHOLD {
                continue;
            }
            let embedding = match self.embedder.embed(&fact.content).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(%bot_id, error = %e, "memory: embedding failed for candidate fact, skipping");
                    continue;
                }
            };
            let existing = match self.vectors.search(bot_id, &embedding, DECIDE_TOP_K).await {
                Ok(hits) => hits.into_iter().map(|(rec, _)| rec).collect::<Vec<_>>(),
                Err(e) => {
                    warn!(%bot_id, error = %e, "memory: top-k lookup failed during decide, treating as empty");
                    Vec::new()
                }
            };
            let decision = match self.llm.decide(&fact, &existing).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(%bot_id, error = %e, "memory: decide call failed, skipping candidate fact");
                    continue;
                }
            };
            self.apply_decision(bot_id, &decision, &fact.content, fact.confidence, embedding, source_turn.clone())
            .await?;
            decisions.push(decision);
        }
        Ok(decisions)
    }

    async fn apply_decision(
        &self,
        bot_id: BotId,
        decision: &Decision,
        content: &str,
        confidence: f32,
        embedding: Vec<f32>,
        source_turn: Option<String>,
    ) -> Result<()> {
        let index = self.index_for(bot_id);
        match decision {
            Decision::None => Ok(()),
            Decision::Add => {
                let now = Utc::now();
                let record = MemoryRecord {
                    id: Uuid::new_v4(),
                    bot_id,
                    content: content.to_string(),
                    embedding,
                    metadata: MemoryMetadata {
                        source_turn,
                        confidence,
                        created_at: now,
                        updated_at: now,
                    },
                };
                self.vectors.upsert(&record).await?;
                index.bm25.lock().await.upsert(record.id, &record.content);
                Ok(())
            }
            Decision::Update { id } => {
                let now = Utc::now();
                let record = MemoryRecord {
                    id: *id,
                    bot_id,
                    content: content.to_string(),
                    embedding,
                    metadata: MemoryMetadata {
                        source_turn,
                        confidence,
                        created_at: now,
                        updated_at: now,
                    },
                };
                self.vectors.upsert(&record).await?;
                index.bm25.lock().await.upsert(record.id, &record.content);
                Ok(())
            }
            Decision::Delete { id } => {
                self.vectors.delete(*id).await?;
                index.bm25.lock().await.remove(id);
                Ok(())
            }
        }
    }

    /// Hybrid search over a bot's memory namespace: `score = α·cosine +
    /// (1-α)·bm25_norm`, α = `HYBRID_ALPHA`. Results are filtered by
    /// `bot_id`; `filter` narrows by time window / `source_turn`.
    pub async fn search(
        &self,
        bot_id: BotId,
        query: &str,
        top_k: Option<u64>,
        filter: SearchFilter,
    ) -> Result<Vec<MemoryHit>> {
        let top_k = top_k.unwrap_or(SEARCH_DEFAULT_TOP_K);
        let embedding = self.embedder.embed(query).await.map_err(MemoryError::Embedder)?;
        let hits = self.vectors.search(bot_id, &embedding, top_k.max(1) * 4).await?;

        let index = self.index_for(bot_id);
        self.ensure_index_loaded(&index, &hits).await;
        let bm25 = index.bm25.lock().await;
        let bm25_raw: Vec<f32> = hits.iter().map(|(rec, _)| bm25.score(&rec.id, query)).collect();
        drop(bm25);
        let bm25_max = bm25_raw.iter().cloned().fold(0.0_f32, f32::max).max(f32::EPSILON);

        let mut scored: Vec<MemoryHit> = hits
        .into_iter()
        .zip(bm25_raw)
        .filter(|((rec, _), _)| passes_filter(rec, &filter))
        .map(|((rec, cosine), bm25_score)| {
                let bm25_norm = bm25_score / bm25_max;
                let score = HYBRID_ALPHA * cosine + (1.0 - HYBRID_ALPHA) * bm25_norm;
                MemoryHit {
                    id: rec.id,
                    content: rec.content,
                    score,
                    metadata: rec.metadata,
                }
        })
        .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k as usize);
        Ok(scored)
    }

    /// First touch of a bot's BM25 index in this process lifetime rebuilds
    /// it from whatever the vector search just returned.
    async fn ensure_index_loaded(&self, index: &Arc<BotIndex>, hits: &[(MemoryRecord, f32)]) {
        if index.loaded.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        let mut bm25 = index.bm25.lock().await;
        for (record, _) in hits {
            bm25.upsert(record.id, &record.content);
        }
    }

    /// Explicit `memory.add` tool call — bypasses Extract/Decide and writes
    /// the content directly, per the built-in tool family.
    pub async fn add(&self, bot_id: BotId, content: &str) -> Result<Uuid> {
        self.ensure_collection().await?;
        let embedding = self.embedder.embed(content).await.map_err(MemoryError::Embedder)?;
        let now = Utc::now();
        let record = MemoryRecord {
            id: Uuid::new_v4(),
            bot_id,
            content: content.to_string(),
            embedding,
            metadata: MemoryMetadata {
                source_turn: None,
                confidence: 1.0,
                created_at: now,
                updated_at: now,
            },
        };
        self.vectors.upsert(&record).await?;
        self.index_for(bot_id).bm25.lock().await.upsert(record.id, &record.content);
        Ok(record.id)
    }

    /// Explicit `memory.update` tool call.
    pub async fn update(&self, bot_id: BotId, id: Uuid, content: &str) -> Result<()> {
        let embedding = self.embedder.embed(content).await.map_err(MemoryError::Embedder)?;
        let now = Utc::now();
        let record = MemoryRecord {
            id,
            bot_id,
            content: content.to_string(),
            embedding,
            metadata: MemoryMetadata {
                source_turn: None,
                confidence: 1.0,
                created_at: now,
                updated_at: now,
            },
        };
        self.vectors.upsert(&record).await?;
        self.index_for(bot_id).bm25.lock().await.upsert(id, content);
        Ok(())
    }

    /// Explicit `memory.delete` tool call.
    pub async fn delete(&self, bot_id: BotId, id: Uuid) -> Result<()> {
        self.vectors.delete(id).await?;
        self.index_for(bot_id).bm25.lock().await.remove(&id);
        Ok(())
    }

    /// `bot_deleted` lifecycle event: purges the bot's vector namespace and
    /// drops its in-process BM25 index and reconciliation lock.
    pub async fn purge_bot(&self, bot_id: BotId) -> Result<()> {
        self.vectors.purge_bot(bot_id).await?;
        self.indexes.remove(&bot_id);
        self.reconcile_locks.remove(&bot_id);
        Ok(())
    }
}

fn passes_filter(record: &MemoryRecord, filter: &SearchFilter) -> bool {
    if let Some(since) = filter.since {
        if record.metadata.created_at < since {
            return false;
        }
    }
    if let Some(until) = filter.until {
        if record.metadata.created_at > until {
            return false;
        }
    }
    if let Some(ref want) = filter.source_turn {
        if record.metadata.source_turn.as_deref() != Some(want.as_str()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct FakeEmbedder;
    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn dimensions(&self) -> usize {
            4
        }
        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, String> {
            let h = text.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32));
            Ok(vec![(h % 97) as f32, (h % 53) as f32, (h % 13) as f32, 1.0])
        }
    }

    struct FakeLlm {
        facts: Vec<crate::types::ExtractedFact>,
        decision: Decision,
    }
    #[async_trait]
    impl MemoryLlm for FakeLlm {
        async fn extract(&self, _window: &[TurnMessage]) -> std::result::Result<Vec<crate::types::ExtractedFact>, String> {
            Ok(self.facts.clone())
        }
        async fn decide(
            &self,
            _candidate: &crate::types::ExtractedFact,
            _existing: &[MemoryRecord],
        ) -> std::result::Result<Decision, String> {
            Ok(self.decision.clone())
        }
    }

    struct FakeVectorStore {
        records: StdMutex<Vec<MemoryRecord>>,
    }
    impl FakeVectorStore {
        fn new() -> Self {
            Self { records: StdMutex::new(Vec::new()) }
        }
    }
    #[async_trait]
    impl VectorStore for FakeVectorStore {
        async fn ensure_collection(&self, _dimensions: u64) -> Result<()> {
            Ok(())
        }
        async fn upsert(&self, record: &MemoryRecord) -> Result<()> {
            let mut recs = self.records.lock().unwrap();
            recs.retain(|r| r.id != record.id);
            recs.push(record.clone());
            Ok(())
        }
        async fn search(&self, bot_id: BotId, _embedding: &[f32], top_k: u64) -> Result<Vec<(MemoryRecord, f32)>> {
            let recs = self.records.lock().unwrap();
            Ok(recs
                .iter()
                .filter(|r| r.bot_id == bot_id)
                .take(top_k as usize)
                .map(|r| (r.clone(), 0.9))
                .collect())
        }
        async fn delete(&self, id: Uuid) -> Result<()> {
            self.records.lock().unwrap().retain(|r| r.id != id);
            Ok(())
        }
        async fn purge_bot(&self, bot_id: BotId) -> Result<()> {
            self.records.lock().unwrap().retain(|r| r.bot_id != bot_id);
            Ok(())
        }
    }

    fn new_engine(decision: Decision, facts: Vec<crate::types::ExtractedFact>) -> MemoryEngine {
        MemoryEngine::new(
            Arc::new(FakeLlm { facts, decision }),
            Arc::new(FakeEmbedder),
            Arc::new(FakeVectorStore::new()),
        )
    }

    #[tokio::test]
    async fn low_confidence_facts_are_dropped_before_decide() {
        let bot = BotId::new();
        let engine = new_engine(
            Decision::Add,
            vec![crate::types::ExtractedFact { content: "weak".into(), confidence: 0.1 }],
        );
        let decisions = engine.reconcile_turn(bot, &[], None).await.unwrap();
        assert!(decisions.is_empty());
    }

    #[tokio::test]
    async fn add_decision_lands_exactly_one_record() {
        let bot = BotId::new();
        let engine = new_engine(
            Decision::Add,
            vec![crate::types::ExtractedFact { content: "Alice works at Acme".into(), confidence: 0.9 }],
        );
        engine.reconcile_turn(bot, &[], Some("turn-1".into())).await.unwrap();
        let hits = engine.search(bot, "Alice", None, SearchFilter::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Alice works at Acme");
    }

    #[tokio::test]
    async fn update_decision_reuses_existing_id() {
        let bot = BotId::new();
        let seed = new_engine(
            Decision::Add,
            vec![crate::types::ExtractedFact { content: "Alice likes coffee".into(), confidence: 0.9 }],
        );
        seed.reconcile_turn(bot, &[], None).await.unwrap();
        let existing_id = seed.search(bot, "Alice", None, SearchFilter::default()).await.unwrap()[0].id;

        let engine = MemoryEngine::new(
            Arc::new(FakeLlm {
                    facts: vec![crate::types::ExtractedFact { content: "Alice prefers tea".into(), confidence: 0.9 }],
                    decision: Decision::Update { id: existing_id },
            }),
            seed.embedder.clone(),
            seed.vectors.clone(),
        );
        engine.reconcile_turn(bot, &[], None).await.unwrap();
        let hits = engine.search(bot, "Alice", None, SearchFilter::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Alice prefers tea");
    }

    #[tokio::test]
    async fn explicit_add_and_delete_round_trip() {
        let bot = BotId::new();
        let engine = new_engine(Decision::None, vec![]);
        let id = engine.add(bot, "manual fact").await.unwrap();
        let hits = engine.search(bot, "manual", None, SearchFilter::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
        engine.delete(bot, id).await.unwrap();
        let hits = engine.search(bot, "manual", None, SearchFilter::default()).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn purge_bot_removes_all_records() {
        let bot = BotId::new();
        let engine = new_engine(Decision::None, vec![]);
        engine.add(bot, "a").await.unwrap();
        engine.add(bot, "b").await.unwrap();
        engine.purge_bot(bot).await.unwrap();
        let hits = engine.search(bot, "a", None, SearchFilter::default()).await.unwrap();
        assert!(hits.is_empty());
    }
}
