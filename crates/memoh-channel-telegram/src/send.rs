//! Code-fence-aware message chunking for Telegram's 4096-char limit.
//!
//! Ported from `skynet-telegram::send::split_chunks_smart`
//! (itself a variant of `skynet-discord::send::split_chunks`): splits are
//! preferred at line boundaries, and if a split would land inside a fenced
//! code block the fence is closed before the boundary and re-opened after.

/// Maximum characters per Telegram message (limit is 4096; 4090 for safety).
const CHUNK_MAX: usize = 4090;

pub fn split_chunks_smart(text: &str) -> Vec<String> {
    if text.len() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut fence_lang: Option<String> = None;

    for line in &lines {
        let cost = if current.is_empty() { line.len() } else { 1 + line.len() };

        if !current.is_empty() && current.len() + cost > CHUNK_MAX {
            if fence_lang.is_some() {
                current.push_str("\n```");
            }
            chunks.push(current);
            current = String::new();
            if let Some(ref lang) = fence_lang {
                if lang.is_empty() {
                    current.push_str("```\n");
                } else {
                    current.push_str("```");
                    current.push_str(lang);
                    current.push('\n');
                }
            }
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        let trimmed = line.trim_start();
        if let Some(after_fence) = trimmed.strip_prefix("```") {
            if fence_lang.is_some() {
                fence_lang = None;
            } else {
                fence_lang = Some(after_fence.trim().to_string());
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    let mut result = Vec::new();
    for chunk in chunks {
        if chunk.len() <= CHUNK_MAX {
            result.push(chunk);
        } else {
            let mut remaining = chunk.as_str();
            while remaining.len() > CHUNK_MAX {
                let split_at = remaining[..CHUNK_MAX]
                .rfind('\n')
                .or_else(|| remaining[..CHUNK_MAX].rfind(' '))
                .unwrap_or(CHUNK_MAX);
                result.push(remaining[..split_at].to_string());
                remaining = remaining[split_at..].trim_start();
            }
            if !remaining.is_empty() {
                result.push(remaining.to_string());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(split_chunks_smart("hi"), vec!["hi".to_string()]);
    }

    #[test]
    fn splits_without_breaking_open_fence() {
        let body = "x".repeat(CHUNK_MAX);
        let text = format!("```rust\n{body}\nmore code\n```");
        let chunks = split_chunks_smart(&text);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].trim_end().ends_with("```"));
        assert!(chunks[1].trim_start().starts_with("```"));
    }
}
