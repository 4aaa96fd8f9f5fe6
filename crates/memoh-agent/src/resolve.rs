//! Model/provider resolution : turns a `TurnInput.model_ref`
//! into a concrete [`LlmProvider`] boxed trait object, dispatching on the
//! model row's `client_type` — the four variants of
//! `memoh_core::types::ClientType`. Unsupported/missing `client_type` is
//! rejected rather than guessed at.

use std::sync::Arc;

use memoh_core::types::{ClientType, ModelId};
use memoh_db::{model::Model, PgPool};

use crate::anthropic::AnthropicProvider;
use crate::error::{AgentError, Result};
use crate::google::GoogleProvider;
use crate::openai::OpenAiProvider;
use crate::openai_responses::OpenAiResponsesProvider;
use crate::provider::LlmProvider;

/// Resolved model + a ready-to-use provider client for it.
pub struct ResolvedModel {
    pub model: Model,
    pub provider: Arc<dyn LlmProvider>,
}

/// Looks up `model_ref` (a `ModelId` in its string form) and builds the
/// provider client for its `client_type`. Fails closed: a model with no
/// `client_type` set, or a `client_type` this build doesn't recognize, is a
/// hard error rather than a silent fallback to some default provider.
pub async fn resolve(pool: &PgPool, model_ref: &str) -> Result<ResolvedModel> {
    let model_id: ModelId = model_ref
    .parse()
    .map_err(|_| AgentError::ModelNotFound(model_ref.to_string()))?;
    let model = memoh_db::providers::get_model(pool, model_id).await?;
    let provider_row = memoh_db::providers::get_provider(pool, model.provider_id).await?;

    let client_type = model
    .client_type
    .ok_or_else(|| AgentError::UnsupportedClientType(format!("model {model_id} has no client_type")))?;

    let provider: Arc<dyn LlmProvider> = match client_type {
        ClientType::AnthropicMessages => Arc::new(AnthropicProvider::new(
                provider_row.api_key.clone(),
                Some(provider_row.base_url.clone()),
        )),
        ClientType::OpenaiCompletions => Arc::new(OpenAiProvider::with_path(
                provider_row.name.clone(),
                provider_row.api_key.clone(),
                provider_row.base_url.clone(),
                "/v1/chat/completions".to_string(),
        )),
        ClientType::OpenaiResponses => Arc::new(OpenAiResponsesProvider::new(
                provider_row.api_key.clone(),
                provider_row.base_url.clone(),
        )),
        ClientType::GoogleGenerativeAi => Arc::new(GoogleProvider::new(
                provider_row.api_key.clone(),
                provider_row.base_url.clone(),
        )),
    };

    Ok(ResolvedModel { model, provider })
}
