//! `web.fetch`/`web.search`. `web.search` is backed by a
//! pluggable [`SearchProvider`] port — the design says "via a registered
//! `SearchProvider`" without naming a concrete one, so this crate defines
//! the seam and `memoh-gateway` wires in whichever provider a bot's
//! `/search-providers` config names.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::{McpError, Result};
use crate::provider::{err_result, ok_result, SessionContext, ToolDescriptor, ToolProvider};

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> std::result::Result<Vec<SearchHit>, String>;
}

pub struct WebToolProvider {
    http: reqwest::Client,
    search: Option<Arc<dyn SearchProvider>>,
}

impl WebToolProvider {
    pub fn new(search: Option<Arc<dyn SearchProvider>>) -> Self {
        Self {
            http: reqwest::Client::new(),
            search,
        }
    }
}

#[async_trait]
impl ToolProvider for WebToolProvider {
    fn provider_name(&self) -> &str {
        "web"
    }

    async fn list_tools(&self, _ctx: &SessionContext) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "web.fetch",
                "Fetch a URL, extract the main article content, and convert it to Markdown",
                serde_json::json!({"type": "object", "properties": {"url": {"type": "string"}}, "required": ["url"]}),
            ),
            ToolDescriptor::new(
                "web.search",
                "Run a web search via the bot's configured search provider",
                serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}, "limit": {"type": "integer"}}, "required": ["query"]}),
            ),
        ]
    }

    async fn call_tool(&self, _ctx: &SessionContext, name: &str, args: Value) -> Result<Value> {
        match name {
            "web.fetch" => {
                let Some(url) = args.get("url").and_then(Value::as_str) else {
                    return Ok(err_result("url is required"));
                };
                let resp = match self.http.get(url).send().await {
                    Ok(r) => r,
                    Err(e) => return Ok(err_result(format!("fetch failed: {e}"))),
                };
                let status = resp.status();
                let body = match resp.text().await {
                    Ok(b) => b,
                    Err(e) => return Ok(err_result(format!("reading body failed: {e}"))),
                };
                if !status.is_success() {
                    return Ok(err_result(format!("HTTP {status}")));
                }
                let article_html = extract_article(&body, url).unwrap_or_else(|| body.clone());
                let markdown = html2md::parse_html(&article_html);
                Ok(ok_result(serde_json::json!({ "url": url, "markdown": markdown })))
            }
            "web.search" => {
                let Some(query) = args.get("query").and_then(Value::as_str) else {
                    return Ok(err_result("query is required"));
                };
                let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(5) as usize;
                let Some(provider) = &self.search else {
                    return Ok(err_result("no search provider configured for this bot"));
                };
                match provider.search(query, limit).await {
                    Ok(hits) => Ok(ok_result(serde_json::json!({ "results": hits }))),
                    Err(e) => Ok(err_result(e)),
                }
            }
            other => Err(McpError::ToolNotFound(other.to_string())),
        }
    }
}

/// Runs a `readability`-style boilerplate-stripping pass over a fetched
/// page before Markdown conversion, so nav/ad/script chrome never reaches
/// the model. Returns `None` on a malformed URL or an extraction failure;
/// the caller falls back to converting the raw body in that case rather
/// than dropping the fetch entirely.
fn extract_article(body: &str, url: &str) -> Option<String> {
    let parsed = match url::Url::parse(url) {
        Ok(u) => u,
        Err(e) => {
            warn!(url, error = %e, "web.fetch: invalid url, skipping readability pass");
            return None;
        }
    };
    match readability::extractor::extract(&mut Cursor::new(body.as_bytes()), &parsed) {
        Ok(product) => Some(product.content),
        Err(e) => {
            warn!(url, error = %e, "web.fetch: readability extraction failed, using raw body");
            None
        }
    }
}
