//! `google-generative-ai` client_type — Google's Generative Language API
//! (`v1beta/models/{model}:generateContent` / `:streamGenerateContent`).
//! Same reqwest + line-buffered-SSE shape as [`crate::openai`]; the API key
//! travels as a query parameter rather than a header, and streaming uses
//! plain `data:` lines (`alt=sse`) with no `event:` line, which
//! [`crate::stream::parse_sse_line`] already handles.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, Role, ToolCall};
use crate::stream::{parse_sse_line, SseParsed, StreamEvent};

pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google-generative-ai"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, req.model, self.api_key
        );

        debug!(model = %req.model, "sending request to Google Generative AI");

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_ms: 5000 });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Google Generative AI error");
            return Err(ProviderError::Api { status, message: text });
        }

        let api_resp: ApiResponse = resp
        .json()
        .await
        .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parse_response(req.model.clone(), api_resp))
    }

    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let body = build_request_body(req);
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, req.model, self.api_key
        );

        debug!(model = %req.model, "sending streaming request to Google Generative AI");

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_ms: 5000 });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Google Generative AI streaming error");
            return Err(ProviderError::Api { status, message: text });
        }

        process_google_stream(resp, req.model.clone(), tx).await;
        Ok(())
    }
}

fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    let contents: Vec<serde_json::Value> = if let Some(ref raw) = req.raw_messages {
        raw.iter().filter_map(raw_message_to_google).collect()
    } else {
        req.messages
        .iter()
        .map(|m| {
                serde_json::json!({
                        "role": google_role(&m.role),
                        "parts": [{ "text": m.content }],
                })
        })
        .collect()
    };

    let mut body = serde_json::json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": req.system }] },
            "generationConfig": { "maxOutputTokens": req.max_tokens },
    });

    if !req.tools.is_empty() {
        let declarations: Vec<serde_json::Value> = req
        .tools
        .iter()
        .map(|t| {
                serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                })
        })
        .collect();
        body["tools"] = serde_json::json!([{ "functionDeclarations": declarations }]);
    }

    body
}

fn google_role(role: &Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        _ => "user",
    }
}

/// Best-effort conversion of an Anthropic-shaped raw message (as built by
/// the turn engine's running message list) into a Gemini `content` item.
/// Tool results surface as a `functionResponse` part, matching the other
/// providers' raw_messages convention for the tool loop.
fn raw_message_to_google(msg: &serde_json::Value) -> Option<serde_json::Value> {
    let role = msg.get("role").and_then(|r| r.as_str()).unwrap_or("user");
    let content = msg.get("content")?;

    if let Some(text) = content.as_str() {
        return Some(serde_json::json!({
                    "role": if role == "assistant" { "model" } else { "user" },
                    "parts": [{ "text": text }],
        }));
    }

    let blocks = content.as_array()?;
    let mut parts = Vec::new();
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                    parts.push(serde_json::json!({ "text": t }));
                }
            }
            Some("tool_use") => {
                parts.push(serde_json::json!({
                            "functionCall": {
                                "name": block.get("name").and_then(|v| v.as_str()).unwrap_or(""),
                                "args": block.get("input").cloned().unwrap_or(serde_json::json!({})),
                            }
                }));
            }
            Some("tool_result") => {
                parts.push(serde_json::json!({
                            "functionResponse": {
                                "name": block.get("tool_use_id").and_then(|v| v.as_str()).unwrap_or(""),
                                "response": { "content": block.get("content").cloned().unwrap_or(serde_json::Value::Null) },
                            }
                }));
            }
            _ => {}
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(serde_json::json!({
                "role": if role == "assistant" { "model" } else { "user" },
                "parts": parts,
    }))
}

fn parse_response(model: String, resp: ApiResponse) -> ChatResponse {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut finish_reason = String::new();

    if let Some(candidate) = resp.candidates.into_iter().next() {
        finish_reason = candidate.finish_reason.unwrap_or_default();
        for (i, part) in candidate.content.parts.into_iter().enumerate() {
            if let Some(text) = part.text {
                text_parts.push(text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall {
                        id: format!("call_{i}"),
                        name: call.name,
                        input: call.args,
                });
            }
        }
    }

    let stop_reason = if tool_calls.is_empty() { finish_reason } else { "tool_use".to_string() };

    ChatResponse {
        content: text_parts.join(""),
        model,
        tokens_in: resp.usage_metadata.as_ref().map(|u| u.prompt_token_count).unwrap_or(0),
        tokens_out: resp.usage_metadata.as_ref().map(|u| u.candidates_token_count).unwrap_or(0),
        stop_reason,
        tool_calls,
    }
}

async fn process_google_stream(resp: reqwest::Response, model: String, tx: mpsc::Sender<StreamEvent>) {
    use futures_util::StreamExt;

    let mut tokens_in: u32 = 0;
    let mut tokens_out: u32 = 0;
    let mut stop_reason = String::new();
    let mut line_buf = String::new();

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
            if let Some(SseParsed::Data(data)) = parse_sse_line(line) {
                if let Ok(chunk_resp) = serde_json::from_str::<ApiResponse>(&data) {
                    if let Some(usage) = &chunk_resp.usage_metadata {
                        tokens_in = usage.prompt_token_count;
                        tokens_out = usage.candidates_token_count;
                    }
                    if let Some(candidate) = chunk_resp.candidates.into_iter().next() {
                        if let Some(reason) = candidate.finish_reason {
                            if !reason.is_empty() {
                                stop_reason = reason;
                            }
                        }
                        for part in candidate.content.parts {
                            if let Some(text) = part.text {
                                if !text.is_empty()
                                && tx.send(StreamEvent::TextDelta { text }).await.is_err()
                                {
                                    return;
                                }
                            }
                            if let Some(call) = part.function_call {
                                stop_reason = "tool_use".to_string();
                                let event = StreamEvent::ToolUse {
                                    id: format!("call_{}", uuid::Uuid::new_v4()),
                                    name: call.name,
                                    input: call.args,
                                };
                                if tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                } else {
                    warn!(data, "unparseable google stream chunk");
                }
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
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: u32,
}
