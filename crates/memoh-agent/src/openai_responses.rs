//! `openai-responses` client_type — OpenAI's `/v1/responses` API. Same
//! transport shape as [`crate::openai`] (reqwest + line-buffered SSE) but a
//! different request/response envelope: input items instead of a messages
//! array, `output[]` instead of `choices[0].message`, and a distinct set of
//! SSE event names.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, ToolCall};
use crate::stream::{parse_sse_line, SseParsed, StreamEvent};

pub struct OpenAiResponsesProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiResponsesProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiResponsesProvider {
    fn name(&self) -> &str {
        "openai-responses"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req, false);
        let url = format!("{}/v1/responses", self.base_url);

        debug!(model = %req.model, "sending request to OpenAI Responses API");

        let resp = self
        .client
        .post(&url)
        .bearer_auth(&self.api_key)
        .header("content-type", "application/json")
        .json(&body)
        .send()
        .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_ms: retry_after_ms(&resp) });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "OpenAI Responses API error");
            return Err(ProviderError::Api { status, message: text });
        }

        let api_resp: ApiResponse = resp
        .json()
        .await
        .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parse_response(api_resp))
    }

    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let body = build_request_body(req, true);
        let url = format!("{}/v1/responses", self.base_url);

        debug!(model = %req.model, "sending streaming request to OpenAI Responses API");

        let resp = self
        .client
        .post(&url)
        .bearer_auth(&self.api_key)
        .header("content-type", "application/json")
        .json(&body)
        .send()
        .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_ms: retry_after_ms(&resp) });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "OpenAI Responses streaming API error");
            return Err(ProviderError::Api { status, message: text });
        }

        process_responses_stream(resp, req.model.clone(), tx).await;
        Ok(())
    }
}

fn retry_after_ms(resp: &reqwest::Response) -> u64 {
    resp.headers()
    .get("retry-after")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.parse::<u64>().ok())
    .map(|s| s * 1000)
    .unwrap_or(5000)
}

fn build_request_body(req: &ChatRequest, stream: bool) -> serde_json::Value {
    // The Responses API takes a flat `input` array of role/content items
    // rather than Chat Completions' `messages`. Structured tool_use/
    // tool_result blocks from `raw_messages` pass through as-is — the
    // Responses API accepts the same item shapes for function calls.
    let input: Vec<serde_json::Value> = if let Some(ref raw) = req.raw_messages {
        raw.clone()
    } else {
        req.messages
        .iter()
        .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
        .collect()
    };

    let mut body = serde_json::json!({
            "model": req.model,
            "instructions": req.system,
            "input": input,
            "max_output_tokens": req.max_tokens,
            "stream": stream,
    });

    if !req.tools.is_empty() {
        let tools: Vec<serde_json::Value> = req
        .tools
        .iter()
        .map(|t| {
                serde_json::json!({
                        "type": "function",
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                })
        })
        .collect();
        body["tools"] = serde_json::json!(tools);
    }

    body
}

fn parse_response(resp: ApiResponse) -> ChatResponse {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for item in &resp.output {
        match item.item_type.as_str() {
            "message" => {
                for block in item.content.iter().flatten() {
                    if let Some(text) = &block.text {
                        text_parts.push(text.clone());
                    }
                }
            }
            "function_call" => {
                let input = item
                .arguments
                .as_deref()
                .and_then(|a| serde_json::from_str(a).ok())
                .unwrap_or(serde_json::json!({}));
                tool_calls.push(ToolCall {
                        id: item.call_id.clone().unwrap_or_default(),
                        name: item.name.clone().unwrap_or_default(),
                        input,
                });
            }
            _ => {}
        }
    }

    let stop_reason = if tool_calls.is_empty() { "stop" } else { "tool_use" };

    ChatResponse {
        content: text_parts.join(""),
        model: resp.model,
        tokens_in: resp.usage.as_ref().map(|u| u.input_tokens).unwrap_or(0),
        tokens_out: resp.usage.as_ref().map(|u| u.output_tokens).unwrap_or(0),
        stop_reason: stop_reason.to_string(),
        tool_calls,
    }
}

async fn process_responses_stream(resp: reqwest::Response, model: String, tx: mpsc::Sender<StreamEvent>) {
    use futures_util::StreamExt;

    let mut tokens_in: u32 = 0;
    let mut tokens_out: u32 = 0;
    let mut stop_reason = "stop".to_string();
    let mut tool_id = String::new();
    let mut tool_name = String::new();
    let mut tool_args = String::new();
    let mut line_buf = String::new();
    let mut current_event = String::new();

    let mut byte_stream = resp.bytes_stream();
    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error { message: e.to_string() }).await;
                return;
            }
        };
        let text = match std::str::from_utf8(&chunk) {
            Ok(t) => t,
            Err(_) => continue,
        };

        line_buf.push_str(text);
        let lines: Vec<&str> = line_buf.split('\n').collect();
        let (complete, remainder) = lines.split_at(lines.len() - 1);
        let remainder = remainder.first().unwrap_or(&"").to_string();

        for line in complete {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_sse_line(line) {
                Some(SseParsed::Event(ev)) => current_event = ev,
                Some(SseParsed::Data(data)) => match current_event.as_str() {
                    "response.output_text.delta" => {
                        if let Ok(d) = serde_json::from_str::<TextDeltaEvent>(&data) {
                            if tx.send(StreamEvent::TextDelta { text: d.delta }).await.is_err() {
                                return;
                            }
                        }
                    }
                    "response.function_call_arguments.delta" => {
                        if let Ok(d) = serde_json::from_str::<FunctionCallDeltaEvent>(&data) {
                            tool_args.push_str(&d.delta);
                        }
                    }
                    "response.output_item.added" => {
                        if let Ok(d) = serde_json::from_str::<OutputItemAddedEvent>(&data) {
                            if d.item.item_type == "function_call" {
                                tool_id = d.item.call_id.unwrap_or_default();
                                tool_name = d.item.name.unwrap_or_default();
                                tool_args.clear();
                            }
                        }
                    }
                    "response.output_item.done" => {
                        if !tool_name.is_empty() {
                            stop_reason = "tool_use".to_string();
                            let input = serde_json::from_str::<serde_json::Value>(&tool_args)
                            .unwrap_or(serde_json::json!({}));
                            let event = StreamEvent::ToolUse {
                                id: std::mem::take(&mut tool_id),
                                name: std::mem::take(&mut tool_name),
                                input,
                            };
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    "response.completed" => {
                        if let Ok(d) = serde_json::from_str::<CompletedEvent>(&data) {
                            if let Some(usage) = d.response.usage {
                                tokens_in = usage.input_tokens;
                                tokens_out = usage.output_tokens;
                            }
                        }
                    }
                    "error" => {
                        warn!(data, "openai responses stream error");
                        let _ = tx.send(StreamEvent::Error { message: data }).await;
                    }
                    _ => {}
                },
                None => {}
            }
        }
        line_buf = remainder;
    }

    let _ = tx
    .send(StreamEvent::Done { model, tokens_in, tokens_out, stop_reason })
    .await;
}

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    output: Vec<OutputItem>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    item_type: String,
    content: Option<Vec<ContentBlock>>,
    call_id: Option<String>,
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct TextDeltaEvent {
    delta: String,
}

#[derive(Deserialize)]
struct FunctionCallDeltaEvent {
    delta: String,
}

#[derive(Deserialize)]
struct OutputItemAddedEvent {
    item: OutputItem,
}

#[derive(Deserialize)]
struct CompletedEvent {
    response: CompletedResponse,
}

#[derive(Deserialize)]
struct CompletedResponse {
    usage: Option<Usage>,
}
