//! `container.read_file`/`write_file`/`list_dir`/`edit_file`/`exec` tools.
//! The container service's only side-effect primitive is `exec`
//! (no separate file RPCs exist), so every file operation here is
//! a shell command run inside the bot's container — `edit_file`'s
//! fuzzy-match is therefore done on this side (read the whole file back,
//! patch in memory, write the result back), generalizing the prior build's
//! `patch_file` tool's "exact, then normalised, then require a unique
//! match" fallback chain to an HTTP/container boundary instead of a local
//! filesystem call.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use memoh_container::{ContainerService, ExecRequest};
use memoh_core::types::BotId;
use serde_json::Value;

use crate::error::{McpError, Result};
use crate::provider::{err_result, ok_result, SessionContext, ToolDescriptor, ToolProvider};

const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ContainerToolProvider {
    containers: std::sync::Arc<ContainerService>,
}

impl ContainerToolProvider {
    pub fn new(containers: std::sync::Arc<ContainerService>) -> Self {
        Self { containers }
    }

    /// Wraps `path` in single quotes, escaping any embedded `'` the POSIX
    /// way (`'\''`), so it's passed to `sh -c` as one literal argument.
    fn shell_quote(path: &str) -> String {
        format!("'{}'", path.replace('\'', "'\\''"))
    }

    async fn run(&self, bot_id: BotId, script: String) -> Result<(String, String, i64)> {
        let outcome = self
        .containers
        .exec(
            bot_id,
            ExecRequest::capture(
                vec!["sh".to_string(), "-c".to_string(), script],
                None,
                DEFAULT_EXEC_TIMEOUT,
            ),
        )
        .await
        .map_err(McpError::from)?
        .into_captured()
        .map_err(McpError::from)?;
        Ok((outcome.stdout, outcome.stderr, outcome.exit_code))
    }

    /// Finds the unique occurrence of `search` in `content` and returns its
    /// `(start, end)` byte span. Tries an exact match first; if that finds
    /// nothing, falls back to a match where smart quotes count as their
    /// ASCII equivalents and any run of whitespace in `search` matches any
    /// run of whitespace in `content` — the span returned is always into
    /// the *original*, unnormalised `content`, so the caller can slice and
    /// replace it directly.
    fn fuzzy_find(content: &str, search: &str) -> std::result::Result<(usize, usize), String> {
        let exact: Vec<_> = content.match_indices(search).collect();
        if exact.len() == 1 {
            return Ok((exact[0].0, exact[0].0 + search.len()));
        }
        if exact.len() > 1 {
            return Err(format!("{} exact matches, need exactly one", exact.len()));
        }

        fn norm_char(c: char) -> char {
            match c {
                '\u{2018}' | '\u{2019}' => '\'',
                '\u{201C}' | '\u{201D}' => '"',
                c => c,
            }
        }

        let tokens: Vec<Vec<char>> = search
        .split_whitespace()
        .map(|tok| tok.chars().map(norm_char).collect())
        .collect();
        if tokens.is_empty() {
            return Err("search text is empty".to_string());
        }

        let chars: Vec<(usize, char)> = content.char_indices().collect();

        // Attempts a token-sequence match starting at `chars[pos]`, requiring
        // at least one whitespace char in `content` between tokens (mirroring
        // `search`'s own whitespace). Returns the end char-index (exclusive)
        // on success.
        let try_at = |pos: usize| -> Option<usize> {
            let mut idx = pos;
            for (ti, token) in tokens.iter().enumerate() {
                if ti > 0 {
                    let before = idx;
                    while idx < chars.len() && chars[idx].1.is_whitespace() {
                        idx += 1;
                    }
                    if idx == before {
                        return None;
                    }
                }
                for &tc in token {
                    if idx >= chars.len() || norm_char(chars[idx].1) != tc {
                        return None;
                    }
                    idx += 1;
                }
            }
            Some(idx)
        };

        let mut spans = Vec::new();
        for pos in 0..chars.len() {
            if let Some(end_idx) = try_at(pos) {
                let start_byte = chars[pos].0;
                let end_byte = chars.get(end_idx).map(|(b, _)| *b).unwrap_or(content.len());
                spans.push((start_byte, end_byte));
            }
        }

        match spans.len() {
            0 => Err("no match found (exact or normalised)".to_string()),
            1 => Ok(spans[0]),
            n => Err(format!("{n} normalised matches, need exactly one")),
        }
    }
}

#[async_trait]
impl ToolProvider for ContainerToolProvider {
    fn provider_name(&self) -> &str {
        "container"
    }

    async fn list_tools(&self, _ctx: &SessionContext) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "container.read_file",
                "Read a file from the bot's container filesystem",
                serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]}),
            ),
            ToolDescriptor::new(
                "container.write_file",
                "Write (overwrite) a file in the bot's container filesystem",
                serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}, "content": {"type": "string"}}, "required": ["path", "content"]}),
            ),
            ToolDescriptor::new(
                "container.list_dir",
                "List a directory in the bot's container filesystem",
                serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]}),
            ),
            ToolDescriptor::new(
                "container.edit_file",
                "Replace a unique occurrence of `search` with `replace` inside a file",
                serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}, "search": {"type": "string"}, "replace": {"type": "string"}}, "required": ["path", "search", "replace"]}),
            ),
            ToolDescriptor::new(
                "container.exec",
                "Run a shell command inside the bot's container and capture its output",
                serde_json::json!({"type": "object", "properties": {"command": {"type": "string"}, "timeout_secs": {"type": "integer"}}, "required": ["command"]}),
            ),
        ]
    }

    async fn call_tool(&self, ctx: &SessionContext, name: &str, args: Value) -> Result<Value> {
        match name {
            "container.read_file" => {
                let Some(path) = args.get("path").and_then(Value::as_str) else {
                    return Ok(err_result("path is required"));
                };
                let (stdout, stderr, code) = self
                .run(ctx.bot_id, format!("cat {}", Self::shell_quote(path)))
                .await?;
                if code != 0 {
                    return Ok(err_result(format!("read failed: {stderr}")));
                }
                Ok(ok_result(serde_json::json!({ "content": stdout })))
            }
            "container.write_file" => {
                let (Some(path), Some(content)) = (
                    args.get("path").and_then(Value::as_str),
                    args.get("content").and_then(Value::as_str),
                ) else {
                    return Ok(err_result("path and content are required"));
                };
                let encoded = BASE64.encode(content.as_bytes());
                let script = format!(
                    "echo {} | base64 -d > {}",
                    Self::shell_quote(&encoded),
                    Self::shell_quote(path)
                );
                let (_, stderr, code) = self.run(ctx.bot_id, script).await?;
                if code != 0 {
                    return Ok(err_result(format!("write failed: {stderr}")));
                }
                Ok(ok_result(serde_json::json!({ "path": path })))
            }
            "container.list_dir" => {
                let Some(path) = args.get("path").and_then(Value::as_str) else {
                    return Ok(err_result("path is required"));
                };
                let (stdout, stderr, code) = self
                .run(ctx.bot_id, format!("ls -la {}", Self::shell_quote(path)))
                .await?;
                if code != 0 {
                    return Ok(err_result(format!("list_dir failed: {stderr}")));
                }
                let entries: Vec<&str> = stdout.lines().collect();
                Ok(ok_result(serde_json::json!({ "entries": entries })))
            }
            "container.edit_file" => {
                let (Some(path), Some(search), Some(replace)) = (
                    args.get("path").and_then(Value::as_str),
                    args.get("search").and_then(Value::as_str),
                    args.get("replace").and_then(Value::as_str),
                ) else {
                    return Ok(err_result("path, search and replace are required"));
                };
                let (stdout, stderr, code) = self
                .run(ctx.bot_id, format!("cat {}", Self::shell_quote(path)))
                .await?;
                if code != 0 {
                    return Ok(err_result(format!("read failed: {stderr}")));
                }
                let (start, end) = match Self::fuzzy_find(&stdout, search) {
                    Ok(span) => span,
                    Err(reason) => return Ok(err_result(reason)),
                };
                let mut patched = String::with_capacity(stdout.len());
                patched.push_str(&stdout[..start]);
                patched.push_str(replace);
                patched.push_str(&stdout[end..]);

                let encoded = BASE64.encode(patched.as_bytes());
                let script = format!(
                    "echo {} | base64 -d > {}",
                    Self::shell_quote(&encoded),
                    Self::shell_quote(path)
                );
                let (_, stderr, code) = self.run(ctx.bot_id, script).await?;
                if code != 0 {
                    return Ok(err_result(format!("write failed: {stderr}")));
                }
                Ok(ok_result(serde_json::json!({ "path": path })))
            }
            "container.exec" => {
                let Some(command) = args.get("command").and_then(Value::as_str) else {
                    return Ok(err_result("command is required"));
                };
                let timeout = args
                .get("timeout_secs")
                .and_then(Value::as_u64)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_EXEC_TIMEOUT);
                let outcome = self
                .containers
                .exec(
                    ctx.bot_id,
                    ExecRequest::capture(
                        vec!["sh".to_string(), "-c".to_string(), command.to_string()],
                        None,
                        timeout,
                    ),
                )
                .await
                .map_err(McpError::from)?
                .into_captured()
                .map_err(McpError::from)?;
                Ok(ok_result(serde_json::json!({
                                "stdout": outcome.stdout,
                                "stderr": outcome.stderr,
                                "exit_code": outcome.exit_code,
                })))
            }
            other => Err(McpError::ToolNotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_quote_escapes_embedded_quotes() {
        assert_eq!(
            ContainerToolProvider::shell_quote("it's here"),
            "'it'\\''s here'"
        );
    }

    #[test]
    fn fuzzy_find_exact_unique_match() {
        let content = "hello world";
        assert_eq!(ContainerToolProvider::fuzzy_find(content, "world"), Ok((6, 11)));
    }

    #[test]
    fn fuzzy_find_rejects_multiple_exact_matches() {
        let content = "a b a";
        assert!(ContainerToolProvider::fuzzy_find(content, "a").is_err());
    }

    #[test]
    fn fuzzy_find_falls_back_to_normalised_quotes() {
        let content = "she said \u{201C}hi\u{201D} there";
        let search = "said \"hi\" there";
        let (start, end) = ContainerToolProvider::fuzzy_find(content, search).unwrap();
        assert_eq!(&content[start..end], "said \u{201C}hi\u{201D} there");
    }

    #[test]
    fn fuzzy_find_tolerates_extra_whitespace() {
        let content = "line one\n\n line two\nline three";
        let search = "line two";
        let (start, end) = ContainerToolProvider::fuzzy_find(content, search).unwrap();
        assert_eq!(&content[start..end], "line two");
    }
}
