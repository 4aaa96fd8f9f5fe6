/// 3-tier system prompt for Anthropic prompt caching.
///
/// TIER 1 (static): the bot's skills list and tool-usage guidance — identical
/// across turns for a given bot, so it earns the cache hit.
/// → `cache_control: {type: "ephemeral"}`.
/// TIER 2 (per-user): the caller's identity and retrieved memories — changes
/// per user, stable within a conversation.
/// → `cache_control: {type: "ephemeral"}`.
/// TIER 3 (volatile): current platform and timestamp — always changes,
/// placed LAST so it never breaks the tier 1/2 cache prefix.
#[derive(Debug, Clone, Default)]
pub struct SystemPrompt {
    pub static_tier: String,
    pub user_tier: String,
    pub volatile_tier: String,
}

impl SystemPrompt {
    /// Flatten all tiers into a single string (for providers without caching).
    pub fn to_plain_text(&self) -> String {
        let mut out = self.static_tier.clone();
        if !self.user_tier.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.user_tier);
        }
        if !self.volatile_tier.is_empty() {
            out.push_str("\n\n");
            out.push_str(&self.volatile_tier);
        }
        out
    }

    /// Convert to Anthropic API format with 2 cache breakpoints.
    /// Returns a JSON array of content blocks with cache_control markers.
    pub fn to_anthropic_blocks(&self) -> Vec<serde_json::Value> {
        let mut blocks = Vec::with_capacity(3);

        blocks.push(serde_json::json!({
                    "type": "text",
                    "text": self.static_tier,
                    "cache_control": { "type": "ephemeral" }
        }));

        if !self.user_tier.is_empty() {
            blocks.push(serde_json::json!({
                        "type": "text",
                        "text": self.user_tier,
                        "cache_control": { "type": "ephemeral" }
            }));
        }

        if !self.volatile_tier.is_empty() {
            blocks.push(serde_json::json!({
                        "type": "text",
                        "text": self.volatile_tier,
            }));
        }

        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_joins_nonempty_tiers() {
        let p = SystemPrompt {
            static_tier: "skills".into(),
            user_tier: "".into(),
            volatile_tier: "now".into(),
        };
        assert_eq!(p.to_plain_text(), "skills\n\nnow");
    }

    #[test]
    fn anthropic_blocks_cache_static_and_user_not_volatile() {
        let p = SystemPrompt {
            static_tier: "skills".into(),
            user_tier: "identity".into(),
            volatile_tier: "now".into(),
        };
        let blocks = p.to_anthropic_blocks();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0]["cache_control"].is_object());
        assert!(blocks[1]["cache_control"].is_object());
        assert!(blocks[2]["cache_control"].is_null());
    }
}
