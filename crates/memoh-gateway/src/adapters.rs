//! Bridges the ports `memoh-memory` and `memoh-mcp` define (`Embedder`,
//! `MemoryLlm`, `MemoryStore`, `SearchProvider`, `SubagentRunner`) onto the
//! concrete providers `memoh-agent` resolves and the `memoh-memory` engine
//! itself. Both crates document that this wiring belongs to whichever
//! binary sits above them — that's this one.

use std::sync::Arc;

use async_trait::async_trait;
use memoh_agent::provider::{ChatRequest, Message as ChatMessage, Role as ChatRole};
use memoh_agent::TurnEngine;
use memoh_core::types::{BotId, ScheduleId, SubagentId};
use memoh_db::PgPool;
use memoh_mcp::provider::SessionContext;
use memoh_mcp::tools::memory::{MemoryHit as ToolMemoryHit, MemoryStore};
use memoh_mcp::tools::schedule::ScheduleReloader;
use memoh_mcp::tools::subagent::SubagentRunner;
use memoh_mcp::tools::web::{SearchHit, SearchProvider};
use memoh_memory::{embed::Embedder, llm::MemoryLlm, manager::MemoryEngine, types::SearchFilter};
use memoh_memory::types::{Decision, ExtractedFact, MemoryRecord, TurnMessage};
use memoh_protocol::agent_event::{AgentEvent, TurnInput};
use memoh_scheduler::SchedulerEngine;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use futures_util::StreamExt;

/// Embeds text via an OpenAI-compatible `/embeddings` endpoint on whatever
/// provider `memory.embedding_model_ref` names. The four `client_type`s
/// `memoh-agent` resolves are all chat-completion wire formats; embeddings
/// are a separate endpoint convention that happens to be the one every
/// OpenAI-compatible host (including most local model servers) shares, so
/// this calls it directly rather than adding a fifth `LlmProvider` method
/// no chat provider would implement.
pub struct HttpEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub async fn resolve(pool: &PgPool, model_ref: &str) -> memoh_core::Result<Self> {
        let model_id: memoh_core::types::ModelId = model_ref
        .parse()
        .map_err(|_| memoh_core::MemohError::Validation(format!("bad embedding model ref {model_ref:?}")))?;
        let model = memoh_db::providers::get_model(pool, model_id)
        .await
        .map_err(|e| memoh_core::MemohError::from(e))?;
        let provider = memoh_db::providers::get_provider(pool, model.provider_id)
        .await
        .map_err(|e| memoh_core::MemohError::from(e))?;
        Ok(Self {
                http: reqwest::Client::new(),
                base_url: provider.base_url,
                api_key: provider.api_key,
                model_id: model.model_id,
                dimensions: model.dimensions.unwrap_or(1536) as usize,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let resp = self
        .http
        .post(&url)
        .bearer_auth(&self.api_key)
        .json(&serde_json::json!({ "model": self.model_id, "input": text }))
        .send()
        .await
        .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("embeddings endpoint returned {}", resp.status()));
        }
        let body: Value = resp.json().await.map_err(|e| e.to_string())?;
        body["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| "malformed embeddings response".to_string())?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32).ok_or_else(|| "non-numeric embedding value".to_string()))
        .collect()
    }
}

/// Drives the memory Extract/Decide pipeline through whichever
/// chat model `memory.memory_model_ref` names, via the same
/// `memoh_agent::resolve`/`LlmProvider::send` seam the turn engine itself
/// uses — just prompted for JSON instead of conversational text.
pub struct ChatMemoryLlm {
    provider: Arc<dyn memoh_agent::provider::LlmProvider>,
    model: String,
}

impl ChatMemoryLlm {
    pub async fn resolve(pool: &PgPool, model_ref: &str) -> memoh_core::Result<Self> {
        let resolved = memoh_agent::resolve::resolve(pool, model_ref)
        .await
        .map_err(|e| memoh_core::MemohError::Internal(e.to_string()))?;
        Ok(Self { provider: resolved.provider, model: resolved.model.model_id })
    }

    async fn ask_json(&self, system: &str, user: &str) -> Result<Value, String> {
        let req = ChatRequest {
            model: self.model.clone(),
            system: system.to_string(),
            system_prompt: None,
            messages: vec![ChatMessage { role: ChatRole::User, content: user.to_string() }],
            max_tokens: 1024,
            stream: false,
            thinking: None,
            tools: Vec::new(),
            raw_messages: None,
        };
        let resp = self.provider.send(&req).await.map_err(|e| e.to_string())?;
        let text = resp.content.trim();
        let json_slice = text
        .find('{')
        .zip(text.rfind('}'))
        .map(|(a, b)| &text[a..=b])
        .or_else(|| text.find('[').zip(text.rfind(']')).map(|(a, b)| &text[a..=b]))
        .unwrap_or(text);
        serde_json::from_str(json_slice).map_err(|e| format!("model returned non-JSON: {e}"))
    }
}

#[async_trait]
impl MemoryLlm for ChatMemoryLlm {
    async fn extract(&self, window: &[TurnMessage]) -> Result<Vec<ExtractedFact>, String> {
        let transcript: String = window.iter().map(|m| format!("{}: {}\n", m.role, m.content)).collect();
        let system = "Extract durable facts worth remembering long-term from this conversation \
                      excerpt. Reply with a JSON array of objects: {\"content\": string, \"confidence\": 0..1}. \
                      Reply with [] if nothing is worth keeping.";
        let value = self.ask_json(system, &transcript).await?;
        let facts: Vec<ExtractedFact> = serde_json::from_value(value).map_err(|e| e.to_string())?;
        Ok(facts)
    }

    async fn decide(&self, candidate: &ExtractedFact, existing: &[MemoryRecord]) -> Result<Decision, String> {
        let existing_json: Vec<Value> = existing
        .iter()
        .map(|r| serde_json::json!({ "id": r.id, "content": r.content }))
        .collect();
        let system = "Given a candidate fact and the most similar existing memory records, \
                      decide how to reconcile them. Reply with exactly one JSON object: \
                      {\"action\":\"add\"} | {\"action\":\"update\",\"id\":\"<uuid>\"} | \
                      {\"action\":\"delete\",\"id\":\"<uuid>\"} | {\"action\":\"none\"}.";
        let user = serde_json::json!({ "candidate": candidate.content, "existing": existing_json }).to_string();
        let value = self.ask_json(system, &user).await?;
        serde_json::from_value(value).map_err(|e| e.to_string())
    }
}

/// Adapts `memoh-memory::MemoryEngine` onto the narrower `MemoryStore` port
/// `memoh-mcp`'s `memory.*` tool family depends on.
pub struct MemoryEngineStore {
    engine: Arc<MemoryEngine>,
}

impl MemoryEngineStore {
    pub fn new(engine: Arc<MemoryEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MemoryStore for MemoryEngineStore {
    async fn search(&self, bot_id: BotId, query: &str, top_k: usize) -> Result<Vec<ToolMemoryHit>, String> {
        let hits = self
        .engine
        .search(bot_id, query, Some(top_k as u64), SearchFilter::default())
        .await
        .map_err(|e| e.to_string())?;
        Ok(hits
            .into_iter()
            .map(|h| ToolMemoryHit { id: h.id.to_string(), content: h.content, score: h.score })
            .collect())
    }

    async fn add(&self, bot_id: BotId, content: &str) -> Result<String, String> {
        self.engine.add(bot_id, content).await.map(|id| id.to_string()).map_err(|e| e.to_string())
    }

    async fn update(&self, bot_id: BotId, id: &str, content: &str) -> Result<(), String> {
        let uuid = id.parse().map_err(|e| format!("bad memory id {id:?}: {e}"))?;
        self.engine.update(bot_id, uuid, content).await.map_err(|e| e.to_string())
    }

    async fn delete(&self, bot_id: BotId, id: &str) -> Result<(), String> {
        let uuid = id.parse().map_err(|e| format!("bad memory id {id:?}: {e}"))?;
        self.engine.delete(bot_id, uuid).await.map_err(|e| e.to_string())
    }
}

/// Runs a sub-agent delegation (`subagent.query`) by submitting a one-shot
/// turn through the same `TurnEngine` the router and scheduler use,
/// restricted to the sub-agent's own `allowed_actions`/model/system prompt,
/// and collecting its final text.
pub struct AgentSubagentRunner {
    pool: PgPool,
    agent: Arc<TurnEngine>,
}

impl AgentSubagentRunner {
    pub fn new(pool: PgPool, agent: Arc<TurnEngine>) -> Self {
        Self { pool, agent }
    }
}

#[async_trait]
impl SubagentRunner for AgentSubagentRunner {
    async fn query(&self, bot_id: BotId, subagent_id: SubagentId, prompt: &str) -> Result<String, String> {
        let subagent = memoh_db::subagents::get(&self.pool, subagent_id).await.map_err(|e| e.to_string())?;
        let model_ref = match subagent.model_id {
            Some(id) => id.to_string(),
            None => memoh_db::bots::model_enabled_as(&self.pool, bot_id, memoh_core::types::EnableAs::Chat)
            .await
            .map_err(|e| e.to_string())?
            .ok_or("bot has no chat model enabled and sub-agent names none")?
            .to_string(),
        };

        let allowed_actions = serde_json::from_value(subagent.allowed_actions).unwrap_or_default();
        let turn = TurnInput {
            model_ref,
            active_context_minutes: 60,
            platforms: vec!["subagent".to_string()],
            current_platform: "subagent".to_string(),
            allowed_actions,
            messages: Vec::new(),
            skills: Vec::new(),
            query: prompt.to_string(),
            identity: serde_json::json!({ "kind": "subagent", "subagent_id": subagent_id.to_string() }),
            attachments: Vec::new(),
        };
        let ctx = SessionContext {
            bot_id,
            current_platform: "subagent".to_string(),
            reply_target: String::new(),
            channel_identity_id: None,
            user_id: None,
        };

        let mut final_text = String::new();
        let mut stream = Box::pin(self.agent.clone().stream(ctx, turn, CancellationToken::new()));
        while let Some(event) = stream.next().await {
            match event {
                AgentEvent::TextDelta { delta } => final_text.push_str(&delta),
                AgentEvent::ProcessingFailed { error } => return Err(error),
                _ => {}
            }
        }
        Ok(final_text)
    }
}

/// Wraps a single externally-configured search backend (`/search-providers`
/// names one; the design leaves the concrete choice unspecified). Talks to
/// any search API that accepts `?q=`/`?key=` and returns a JSON array of
/// `{title, url, snippet}` — the shape a bot operator's configured provider
/// is expected to normalize to, since no concrete vendor is mandated.
pub struct HttpSearchProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSearchProvider {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self { http: reqwest::Client::new(), endpoint, api_key }
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, String> {
        let mut req = self.http.get(&self.endpoint).query(&[("q", query), ("limit", &limit.to_string())]);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("search provider returned {}", resp.status()));
        }
        let hits: Vec<SearchHit> = resp.json().await.map_err(|e| e.to_string())?;
        Ok(hits.into_iter().take(limit).collect())
    }
}

/// Stand-in `Embedder`/`MemoryLlm` pair for deployments that leave
/// `memory.embedding_model_ref`/`memory_model_ref` unset. `MemoryEngine`
/// itself has no notion of "disabled", so
/// rather than making every caller handle an absent engine, startup wires
/// one in that always fails — `reconcile_turn`'s fire-and-forget spawn logs
/// and drops the error, and `memory.search`/`add`/`update`/`delete` surface
/// it as a normal tool-level `{ok: false}` failure.
pub struct NoopEmbedder;

#[async_trait]
impl Embedder for NoopEmbedder {
    fn dimensions(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, String> {
        Err("memory engine has no embedding model configured".to_string())
    }
}

pub struct NoopMemoryLlm;

#[async_trait]
impl MemoryLlm for NoopMemoryLlm {
    async fn extract(&self, _window: &[TurnMessage]) -> Result<Vec<ExtractedFact>, String> {
        Err("memory engine has no memory model configured".to_string())
    }

    async fn decide(&self, _candidate: &ExtractedFact, _existing: &[MemoryRecord]) -> Result<Decision, String> {
        Err("memory engine has no memory model configured".to_string())
    }
}

/// Re-arms a schedule's timer after a CRUD mutation (`schedule.create` /
/// `.update` / `.delete`) by forwarding into the live [`SchedulerEngine`].
/// `memoh-mcp` cannot name `memoh-scheduler` directly — the scheduler
/// depends on `memoh-agent`, which depends on this crate — so the gateway
/// closes the loop through [`ScheduleReloader`] instead.
pub struct SchedulerReloaderAdapter(Arc<SchedulerEngine>);

impl SchedulerReloaderAdapter {
    pub fn new(scheduler: Arc<SchedulerEngine>) -> Self {
        Self(scheduler)
    }
}

#[async_trait]
impl ScheduleReloader for SchedulerReloaderAdapter {
    async fn reload(&self, id: ScheduleId) -> Result<(), String> {
        self.0.reload(id).await.map_err(|e| e.to_string())
    }
}
