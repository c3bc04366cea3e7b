//! Truncated-thinking detection and recovery (§4.3.2).

use crate::messages::{ChatCompletionRequest, ChatCompletionResponse, Message};

const REASONING_TAGS: &[&str] = &["think", "thinking", "reasoning", "r", "internal_thought"];
const EXCERPT_LIMIT: usize = 500;

/// `finish_reason == "length"` AND an opening tag from the reasoning-tag set appears
/// in content AND no matching closing tag appears.
pub fn is_truncated_thinking(response: &ChatCompletionResponse) -> bool {
    if response.first_finish_reason() != Some("length") {
        return false;
    }
    let Some(message) = response.first_message() else { return false };
    find_unclosed_tag(&message.content).is_some()
}

fn find_unclosed_tag(content: &str) -> Option<&'static str> {
    REASONING_TAGS.iter().copied().find(|tag| {
        let open = format!("<{tag}>");
        let close = format!("</{tag}>");
        content.contains(&open) && !content.contains(&close)
    })
}

/// Mutates `request` in place per the recovery steps: appends the truncated reasoning
/// as an assistant message (excerpt capped at 500 chars), appends `/no_think` to the
/// last user message. The caller re-dispatches exactly once; this never recurses.
pub fn recover(request: &mut ChatCompletionRequest, response: &ChatCompletionResponse) {
    let Some(message) = response.first_message() else { return };
    let Some(tag) = find_unclosed_tag(&message.content) else { return };

    let open = format!("<{tag}>");
    let reasoning = message.content.splitn(2, &open).nth(1).unwrap_or(&message.content);
    let excerpt: String = reasoning.chars().take(EXCERPT_LIMIT).collect();

    request.messages.push(Message::assistant(format!("[Internal reasoning: {excerpt}]")));

    if let Some(last_user) = request.messages.iter_mut().rev().find(|m| m.role == crate::messages::Role::User) {
        last_user.content.push_str(" /no_think");
    }
}
