//! Agent turn engine : resolves a model/provider pair, builds the
//! turn's tool set and system prompt, and streams `AgentEvent`s through a
//! tool-dispatch loop capped at [`engine::MAX_STEPS`] round trips.
//!
//! Four `client_type`s of `memoh_core::types::ClientType` are supported —
//! [`anthropic::AnthropicProvider`], [`openai::OpenAiProvider`],
//! [`openai_responses::OpenAiResponsesProvider`], [`google::GoogleProvider`]
//! — all behind the single [`provider::LlmProvider`] trait so the engine
//! itself never branches on provider identity.

pub mod anthropic;
pub mod anthropic_stream;
pub mod attachments;
pub mod context;
pub mod engine;
pub mod error;
pub mod google;
pub mod openai;
pub mod openai_responses;
pub mod prompt;
pub mod provider;
pub mod resolve;
pub mod stream;
pub mod thinking;

pub use engine::TurnEngine;
pub use error::{AgentError, Result};
