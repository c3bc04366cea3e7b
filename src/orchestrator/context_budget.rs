//! Context-window budget estimation and compression (§4.3 steps 4-5, §4.3.1).

use crate::downstream::CmsClient;
use crate::messages::{Message, Role};
use crate::observability::InfraStatus;
use std::sync::Arc;

const CHARS_PER_TOKEN: f64 = 4.0;
const PER_MESSAGE_OVERHEAD_TOKENS: u32 = 4;
pub const SAFETY_MARGIN: f64 = 0.85;
const MIN_FLOOR_TOKENS: u32 = 100;

/// Coarse token estimate: `chars / CHARS_PER_TOKEN` plus a fixed per-message overhead.
/// Deliberately approximate; exact tokenization is out of scope.
pub fn estimate_tokens(messages: &[Message]) -> u32 {
    messages
        .iter()
        .map(|m| (m.content.len() as f64 / CHARS_PER_TOKEN).ceil() as u32 + PER_MESSAGE_OVERHEAD_TOKENS)
        .sum()
}

pub fn exceeds_budget(estimated_tokens: u32, context_limit: u32) -> bool {
    estimated_tokens as f64 > SAFETY_MARGIN * context_limit as f64
}

/// Applies context compression in place, per §4.3.1: CMS first (if configured and
/// reachable), falling back to local newest-first accumulation with a floor guard.
pub async fn compress(
    messages: &mut Vec<Message>,
    model: &str,
    context_limit: u32,
    cms: Option<&CmsClient>,
    cms_proxy_mode: bool,
    infra_status: &InfraStatus,
) {
    if cms_proxy_mode {
        log::info!("context budget exceeded for model '{model}'; delegating to CMS proxy mode");
        return;
    }

    if let Some(cms) = cms {
        if infra_status.cms_available() {
            let content_only: String = messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n");

            match cms.process(&content_only, model).await {
                Ok(resp) if resp.is_usable() => {
                    if let Some(text) = resp.resolved_text() {
                        let system = messages.iter().find(|m| m.role == Role::System).cloned();
                        messages.clear();
                        if let Some(system) = system {
                            messages.push(system);
                        }
                        messages.push(Message::user(text));
                        return;
                    }
                }
                Ok(_) => {
                    log::warn!("CMS returned an empty result for model '{model}'; falling back locally");
                }
                Err(e) => {
                    log::warn!("CMS call failed: {e}; marking CMS unavailable and falling back locally");
                    infra_status.mark_cms_failed();
                }
            }
        }
    }

    compress_locally(messages, context_limit);
}

/// Newest-to-oldest accumulation up to `SAFETY_MARGIN * context_limit`, with a floor
/// guard that hard-truncates the last message rather than ever producing an empty
/// result.
fn compress_locally(messages: &mut Vec<Message>, context_limit: u32) {
    let budget_tokens = (SAFETY_MARGIN * context_limit as f64) as u32;

    let system = messages.iter().find(|m| m.role == Role::System).cloned();
    let rest: Vec<Message> = messages.iter().filter(|m| m.role != Role::System).cloned().collect();

    let mut kept: Vec<Message> = Vec::new();
    let mut used_tokens = system.as_ref().map(|m| estimate_tokens(std::slice::from_ref(m))).unwrap_or(0);

    for message in rest.iter().rev() {
        let cost = estimate_tokens(std::slice::from_ref(message));
        if used_tokens + cost > budget_tokens {
            break;
        }
        used_tokens += cost;
        kept.push(message.clone());
    }
    kept.reverse();

    if kept.is_empty() {
        if let Some(last) = rest.last() {
            let floor_chars = ((MIN_FLOOR_TOKENS as f64) * CHARS_PER_TOKEN) as usize;
            let remaining_tokens = budget_tokens.saturating_sub(used_tokens).max(MIN_FLOOR_TOKENS);
            let max_chars = ((remaining_tokens as f64) * CHARS_PER_TOKEN).max(floor_chars as f64) as usize;
            let truncated: String = last.content.chars().take(max_chars).collect();
            let mut floor_message = last.clone();
            floor_message.content = truncated;
            kept.push(floor_message);
        }
    }

    messages.clear();
    if let Some(system) = system {
        messages.push(system);
    }
    messages.extend(kept);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_compression_never_produces_empty_messages() {
        let mut messages = vec![
            Message::system("system prompt"),
            Message::user(&"a".repeat(10_000)),
        ];
        let infra = InfraStatus::default();
        compress(&mut messages, "gpt-5.2", 100, None, false, &infra).await;
        assert!(!messages.is_empty());
        assert!(messages.iter().any(|m| !m.content.is_empty()));
    }

    #[tokio::test]
    async fn local_compression_keeps_newest_messages_first() {
        let mut messages = vec![
            Message::user("old message"),
            Message::assistant("middle message"),
            Message::user("newest message"),
        ];
        let infra = InfraStatus::default();
        compress(&mut messages, "gpt-5.2", 10_000, None, false, &infra).await;
        assert_eq!(messages.last().unwrap().content, "newest message");
    }

    #[tokio::test]
    async fn proxy_mode_leaves_messages_untouched() {
        let mut messages = vec![Message::user("hello")];
        let original = messages.clone();
        let infra = InfraStatus::default();
        compress(&mut messages, "gpt-5.2", 1, None, true, &infra).await;
        assert_eq!(messages.len(), original.len());
        assert_eq!(messages[0].content, original[0].content);
    }

    #[test]
    fn budget_check_uses_safety_margin() {
        assert!(exceeds_budget(90, 100));
        assert!(!exceeds_budget(80, 100));
    }
}
