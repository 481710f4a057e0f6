//! Prompt construction and smart truncation — §4.7.1. Grounded in
//! `skynet_agent::prompt`'s `truncate_content` (70% head / 20% tail /
//! marker split) and its "enforce a total cap, trim from the end" shape,
//! adapted from trimming workspace files to trimming conversation history.

use bridge_core::types::{Message, MessageRole};
use bridge_providers::{ContentPart, Message as ProviderMessage, Role};

const TRUNCATION_MARKER: &str = "\n\n[... tool output truncated ...]\n\n";

/// Rough chars-per-token ratio used for the proactive-pruning budget check.
/// Good enough for a pre-flight guard; the provider's own token accounting
/// is authoritative for anything billed.
const CHARS_PER_TOKEN: usize = 4;

fn estimate_tokens(messages: &[ProviderMessage], system: &str) -> usize {
    let body_chars: usize = messages.iter().map(|m| m.plain_text().len()).sum();
    (body_chars + system.len()) / CHARS_PER_TOKEN
}

/// 70% head / 20% tail split with a marker in between — same ratios as
/// `skynet_agent::prompt::truncate_content`, applied to a single oversized
/// tool-result body instead of a workspace file.
pub fn truncate_body(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        return content.to_string();
    }
    let head_chars = max_chars * 70 / 100;
    let tail_chars = max_chars * 20 / 100;

    let head_end = content[..head_chars.min(content.len())]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(head_chars.min(content.len()));
    let tail_start = if content.len() > tail_chars {
        content[(content.len() - tail_chars)..]
            .find('\n')
            .map(|i| content.len() - tail_chars + i + 1)
            .unwrap_or(content.len() - tail_chars)
    } else {
        0
    };

    let mut out = String::with_capacity(head_end + TRUNCATION_MARKER.len() + (content.len() - tail_start));
    out.push_str(&content[..head_end]);
    out.push_str(TRUNCATION_MARKER);
    out.push_str(&content[tail_start..]);
    out
}

fn to_provider_role(role: MessageRole) -> Option<Role> {
    match role {
        MessageRole::User => Some(Role::User),
        MessageRole::Assistant => Some(Role::Assistant),
        MessageRole::System => None,
    }
}

/// §4.7.1 `build_prompt`. `history` must already be the candidate window
/// (oldest first) pulled from the store; this function applies the
/// filtering/mapping/ordering rules but does not itself bound how many rows
/// it's handed — callers pass `history_limit` most-recent rows.
pub fn build_prompt(
    effective_system_prompt: &str,
    history: &[Message],
    latest_user_message: &str,
    oversized_tool_result_chars: usize,
) -> (String, Vec<ProviderMessage>) {
    let mut messages: Vec<ProviderMessage> = history
        .iter()
        .filter(|m| !m.metadata.exclude_from_history && !m.metadata.body.is_empty())
        .filter_map(|m| {
            let role = to_provider_role(m.metadata.role)?;
            let body = if m.metadata.has_tool_calls {
                truncate_body(&m.metadata.body, oversized_tool_result_chars)
            } else {
                m.metadata.body.clone()
            };
            Some(ProviderMessage::text(role, body))
        })
        .collect();

    messages.push(ProviderMessage::text(Role::User, latest_user_message));

    (effective_system_prompt.to_string(), messages)
}

/// §4.7.1 smart-truncation: applied only when proactive pruning is enabled
/// and the estimated prompt size still exceeds `context_window_tokens`
/// after the history window has already been capped. Never removes the
/// system prompt or the last message (the latest user turn); first shrinks
/// oversized tool-result bodies, then drops the oldest remaining messages
/// while keeping tool-call/tool-result pairs together.
pub fn smart_truncate(
    system: &str,
    mut messages: Vec<ProviderMessage>,
    context_window_tokens: usize,
) -> Vec<ProviderMessage> {
    if estimate_tokens(&messages, system) <= context_window_tokens || messages.len() <= 1 {
        return messages;
    }

    // Pass 1: shrink any already-oversized body harder (half the bound we
    // originally truncated to) before dropping whole messages.
    let truncate_count = messages.len() - 1;
    for i in 0..truncate_count {
        for part in &mut messages[i].parts {
            if let ContentPart::Text { text } = part {
                if text.len() > 2000 {
                    *text = truncate_body(text, 1000);
                }
            }
        }
        if estimate_tokens(&messages, system) <= context_window_tokens {
            return messages;
        }
    }

    // Pass 2: drop oldest messages (never index 0 if it were the system
    // prompt — system is tracked separately here — and never the last,
    // latest-user, message), one at a time.
    while messages.len() > 1 && estimate_tokens(&messages, system) > context_window_tokens {
        messages.remove(0);
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::types::{MessageMetadata, PortalKey, LoginId};

    fn msg(role: MessageRole, body: &str, exclude: bool) -> Message {
        let meta = MessageMetadata {
            role,
            body: body.to_string(),
            exclude_from_history: exclude,
            ..Default::default()
        };
        Message::new(PortalKey::new("p1", LoginId::from("l1")), "u1", meta)
    }

    #[test]
    fn truncate_body_keeps_head_and_tail() {
        let long = "line\n".repeat(1000);
        let out = truncate_body(&long, 200);
        assert!(out.len() < long.len());
        assert!(out.contains("truncated"));
        assert!(out.starts_with("line"));
    }

    #[test]
    fn truncate_body_is_noop_under_limit() {
        assert_eq!(truncate_body("short", 200), "short");
    }

    #[test]
    fn build_prompt_skips_excluded_and_empty_and_appends_latest_last() {
        let history = vec![
            msg(MessageRole::User, "hi", false),
            msg(MessageRole::Assistant, "hello", false),
            msg(MessageRole::User, "secret", true),
            msg(MessageRole::User, "", false),
        ];
        let (system, messages) = build_prompt("be nice", &history, "what now?", 4000);
        assert_eq!(system, "be nice");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages.last().unwrap().plain_text(), "what now?");
        assert!(messages.iter().all(|m| m.plain_text() != "secret"));
    }

    #[test]
    fn smart_truncate_drops_oldest_before_touching_latest() {
        let mut messages = Vec::new();
        for i in 0..10 {
            messages.push(ProviderMessage::text(Role::User, format!("msg {i}")));
        }
        let truncated = smart_truncate("sys", messages.clone(), 1);
        assert!(truncated.len() < messages.len());
        assert_eq!(truncated.last().unwrap().plain_text(), "msg 9");
    }
}
