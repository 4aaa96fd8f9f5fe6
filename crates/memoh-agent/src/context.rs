//! Turn context assembly : recent history trimmed to a
//! token budget, retrieved memories, and the skills list, folded into the
//! 3-tier [`SystemPrompt`]. Grounded on the prior build's
//! `pipeline::process::process_message_non_streaming`, which assembles the
//! same three ingredients (history, memory context, skill index) before
//! calling the provider — generalized here from SQLite-backed per-session
//! history to `memoh_db::messages::list_for_bot` and from the prior build's
//! ad-hoc `MemoryManager` helpers to `memoh_memory::MemoryEngine::search`.

use chrono::{Duration, Utc};
use memoh_core::types::BotId;
use memoh_db::model::Message as DbMessage;
use memoh_db::PgPool;
use memoh_memory::{MemoryEngine, SearchFilter};
use tiktoken_rs::cl100k_base;

use crate::error::Result;
use crate::prompt::SystemPrompt;

/// Default `max_context_tokens` when a bot hasn't configured one. Chosen to
/// leave ample room under the smallest context window this build targets.
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 100_000;

/// Top-K memories folded into the user tier of the system prompt.
const MEMORY_TOP_K: u64 = 8;

pub struct ContextBundle {
    pub system_prompt: SystemPrompt,
    /// Oldest-first; already trimmed to `max_context_tokens`.
    pub history: Vec<DbMessage>,
}

/// Loads recent history and retrieved memories and assembles the turn's
/// system prompt. `query` drives the memory search; `skills` renders into
/// the static (cacheable) tier alongside generic tool-usage guidance.
pub async fn build(
    pool: &PgPool,
    memory: &MemoryEngine,
    bot_id: BotId,
    active_context_minutes: i64,
    current_platform: &str,
    skills: &[String],
    query: &str,
    max_context_tokens: usize,
) -> Result<ContextBundle> {
    let since = Utc::now() - Duration::minutes(active_context_minutes);
    let mut history = memoh_db::messages::list_for_bot(pool, bot_id, since).await?;
    trim_to_token_budget(&mut history, max_context_tokens);

    let hits = memory.search(bot_id, query, Some(MEMORY_TOP_K), SearchFilter::default()).await?;

    let system_prompt = SystemPrompt {
        static_tier: render_static_tier(skills),
        user_tier: render_memory_tier(&hits),
        volatile_tier: render_volatile_tier(current_platform),
    };

    Ok(ContextBundle { system_prompt, history })
}

/// Drops the oldest messages (front of the oldest-first list) until the
/// serialized remainder fits `max_tokens`, per the "oldest-first
/// removal". A single oversized message is kept rather than dropped to zero
/// — the provider, not the context loader, is the authority on hard limits.
fn trim_to_token_budget(history: &mut Vec<DbMessage>, max_tokens: usize) {
    let bpe = cl100k_base().expect("cl100k_base encoder is bundled and always loads");
    let mut total: usize = history.iter().map(|m| count_tokens(&bpe, m)).sum();
    while total > max_tokens && history.len() > 1 {
        let removed = history.remove(0);
        total = total.saturating_sub(count_tokens(&bpe, &removed));
    }
}

fn count_tokens(bpe: &tiktoken_rs::CoreBPE, message: &DbMessage) -> usize {
    let text = match &message.content {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    bpe.encode_ordinary(&text).len()
}

fn render_static_tier(skills: &[String]) -> String {
    let mut out = String::from(
        "You are Memoh, an assistant operating through chat platforms on behalf of your bot owner. \
         Use the tools available to you; prefer the narrowest tool that accomplishes the task. \
         When producing files the user should receive, reference them inside an \
         <attachments>\n- /path\n</attachments> block.",
    );
    if !skills.is_empty() {
        out.push_str("\n\n## Skills\n");
        for skill in skills {
            out.push_str("- ");
            out.push_str(skill);
            out.push('\n');
        }
    }
    out
}

fn render_memory_tier(hits: &[memoh_memory::MemoryHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }
    let mut out = String::from("## What you remember about this conversation\n");
    for hit in hits {
        out.push_str("- ");
        out.push_str(&hit.content);
        out.push('\n');
    }
    out
}

fn render_volatile_tier(current_platform: &str) -> String {
    format!(
        "Current platform: {current_platform}\nCurrent time: {}",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoh_core::types::MessageRole;

    fn msg(text: &str) -> DbMessage {
        DbMessage {
            id: memoh_core::types::MessageId::new(),
            bot_id: BotId::new(),
            route_id: None,
            sender_channel_identity_id: None,
            sender_user_id: None,
            platform: None,
            external_message_id: None,
            source_reply_to_message_id: None,
            role: MessageRole::User,
            content: serde_json::Value::String(text.to_string()),
            metadata: serde_json::json!({}),
            usage: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn keeps_at_least_one_message_even_under_budget() {
        let mut history = vec![msg(&"word ".repeat(5000))];
        trim_to_token_budget(&mut history, 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn drops_oldest_first_until_under_budget() {
        let mut history = vec![msg("alpha"), msg("beta"), msg("gamma")];
        trim_to_token_budget(&mut history, 2);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, serde_json::Value::String("gamma".to_string()));
    }

    #[test]
    fn static_tier_renders_skills() {
        let rendered = render_static_tier(&["deploy".to_string(), "triage".to_string()]);
        assert!(rendered.contains("- deploy"));
        assert!(rendered.contains("- triage"));
    }
}
