//! §4.8 compaction: when a context-length error forces a retry, summarize
//! the oldest portion of the prompt through a cheap model rather than
//! dropping it outright, folding the summary into a synthetic system
//! message and keeping the most recent turns verbatim.
//!
//! Grounded in `skynet_agent::pipeline::compact::compact_session_if_needed`'s
//! shape (oldest-batch transcript, cheap-model call, structured extraction)
//! adapted from a detached fire-and-forget background task into a
//! synchronous call the retry loop awaits directly, since here compaction
//! gates whether the turn can complete at all rather than running
//! independently of it.

use bridge_providers::{ChatRequest, LlmProvider, Message as ProviderMessage, ProviderError, Role};

/// How many of the most recent messages are always kept verbatim; only the
/// prefix older than this is ever folded into a summary.
const KEEP_RECENT: usize = 6;

const SUMMARIZER_SYSTEM_PROMPT: &str = concat!(
    "You compress an earlier portion of a conversation into a short summary ",
    "for another assistant to use as context. Preserve names, decisions, ",
    "open questions and anything the user asked to be remembered. Omit tool ",
    "chatter and pleasantries. Respond with plain prose, no preamble."
);

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "USER",
        Role::Assistant => "ASSISTANT",
        Role::System => "SYSTEM",
    }
}

/// Fold everything but the most recent `KEEP_RECENT` messages into a single
/// synthetic system message summarizing them. A no-op when there isn't
/// enough history to be worth compacting.
pub async fn compact_messages(
    provider: &dyn LlmProvider,
    summarization_model: &str,
    mut messages: Vec<ProviderMessage>,
) -> Result<Vec<ProviderMessage>, ProviderError> {
    if messages.len() <= KEEP_RECENT + 1 {
        return Ok(messages);
    }

    let split_at = messages.len() - KEEP_RECENT;
    let older: Vec<ProviderMessage> = messages.drain(..split_at).collect();
    let transcript: String = older
        .iter()
        .map(|m| format!("{}: {}", role_label(m.role), m.plain_text()))
        .collect::<Vec<_>>()
        .join("\n\n");

    let req = ChatRequest {
        model: summarization_model.to_string(),
        system: SUMMARIZER_SYSTEM_PROMPT.to_string(),
        messages: vec![ProviderMessage::text(
            Role::User,
            format!("Summarize this part of the conversation:\n\n{transcript}"),
        )],
        max_tokens: 512,
        temperature: 0.3,
        stream: false,
        tools: Vec::new(),
        previous_response_id: None,
        function_call_outputs: Vec::new(),
    };

    let resp = provider.send(&req).await?;
    let summary = resp.content.trim().to_string();

    let mut compacted = Vec::with_capacity(messages.len() + 1);
    compacted.push(ProviderMessage::text(
        Role::System,
        format!("Summary of earlier conversation:\n{summary}"),
    ));
    compacted.extend(messages);
    Ok(compacted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_providers::ChatResponse;

    struct StubProvider;

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "the user asked about rust and wants terse replies".into(),
                model: "gpt-4o-mini".into(),
                tokens_in: 10,
                tokens_out: 10,
                finish_reason: "stop".into(),
                tool_calls: Vec::new(),
                response_id: None,
            })
        }
    }

    fn msgs(n: usize) -> Vec<ProviderMessage> {
        (0..n).map(|i| ProviderMessage::text(Role::User, format!("msg {i}"))).collect()
    }

    #[tokio::test]
    async fn short_history_is_left_untouched() {
        let out = compact_messages(&StubProvider, "gpt-4o-mini", msgs(4)).await.unwrap();
        assert_eq!(out.len(), 4);
    }

    #[tokio::test]
    async fn long_history_is_folded_into_a_leading_summary() {
        let out = compact_messages(&StubProvider, "gpt-4o-mini", msgs(20)).await.unwrap();
        assert_eq!(out.len(), KEEP_RECENT + 1);
        assert_eq!(out[0].role, Role::System);
        assert!(out[0].plain_text().contains("terse replies"));
        assert_eq!(out.last().unwrap().plain_text(), "msg 19");
    }
}
