//! §4.8 error policy: drive a context-length failure through compaction
//! first, reactive smart truncation second, bounded by
//! `TurnConfig::max_retry_attempts`, before surfacing a "too long" notice.

use bridge_providers::{LlmProvider, Message as ProviderMessage};

use crate::compaction::compact_messages;
use crate::error::TurnError;
use crate::prompt::smart_truncate;

pub const TOO_LONG_NOTICE: &str =
    "This conversation is too long for the model's context window, even after summarizing and trimming history.";

pub struct RetryDriver<'a> {
    pub provider: &'a dyn LlmProvider,
    pub summarization_model: &'a str,
    pub context_window_tokens: usize,
    pub max_attempts: u32,
}

impl<'a> RetryDriver<'a> {
    /// Run `attempt` against `(system, messages)`, retrying on
    /// `TurnError::ContextLength` by compacting (once) then truncating, up
    /// to `max_attempts` total tries. Any other error, or a context-length
    /// error once attempts are exhausted, is returned as-is.
    pub async fn run<F, Fut, T>(
        &self,
        mut system: String,
        mut messages: Vec<ProviderMessage>,
        mut attempt: F,
    ) -> Result<T, TurnError>
    where
        F: FnMut(String, Vec<ProviderMessage>) -> Fut,
        Fut: std::future::Future<Output = Result<T, TurnError>>,
    {
        let mut compacted_once = false;
        let attempts = self.max_attempts.max(1);

        for attempt_no in 0..attempts {
            match attempt(system.clone(), messages.clone()).await {
                Ok(value) => return Ok(value),
                Err(TurnError::ContextLength { requested_tokens, model_max_tokens })
                    if attempt_no + 1 < attempts =>
                {
                    if !compacted_once {
                        compacted_once = true;
                        if let Ok(compacted) =
                            compact_messages(self.provider, self.summarization_model, messages.clone()).await
                        {
                            messages = compacted;
                            continue;
                        }
                    }
                    if messages.len() >= 2 {
                        messages = smart_truncate(&system, messages, self.context_window_tokens);
                        continue;
                    }
                    return Err(TurnError::ContextLength { requested_tokens, model_max_tokens });
                }
                Err(e) => return Err(e),
            }
        }

        Err(TurnError::ContextLength {
            requested_tokens: None,
            model_max_tokens: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_providers::{ChatRequest, ChatResponse, ProviderError, Role};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider;

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "summary".into(),
                model: "gpt-4o-mini".into(),
                tokens_in: 1,
                tokens_out: 1,
                finish_reason: "stop".into(),
                tool_calls: Vec::new(),
                response_id: None,
            })
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_when_attempt_does_not_error() {
        let driver = RetryDriver {
            provider: &StubProvider,
            summarization_model: "gpt-4o-mini",
            context_window_tokens: 1000,
            max_attempts: 3,
        };
        let result = driver
            .run("sys".to_string(), vec![ProviderMessage::text(Role::User, "hi")], |_s, _m| async {
                Ok::<_, TurnError>(42)
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn retries_through_compaction_then_succeeds() {
        let driver = RetryDriver {
            provider: &StubProvider,
            summarization_model: "gpt-4o-mini",
            context_window_tokens: 1000,
            max_attempts: 3,
        };
        let calls = AtomicUsize::new(0);
        let messages: Vec<ProviderMessage> = (0..20)
            .map(|i| ProviderMessage::text(Role::User, format!("msg {i}")))
            .collect();
        let result = driver
            .run("sys".to_string(), messages, |_s, _m| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(TurnError::ContextLength { requested_tokens: None, model_max_tokens: None })
                    } else {
                        Ok::<_, TurnError>("ok")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_attempts() {
        let driver = RetryDriver {
            provider: &StubProvider,
            summarization_model: "gpt-4o-mini",
            context_window_tokens: 1000,
            max_attempts: 2,
        };
        let messages: Vec<ProviderMessage> = (0..20)
            .map(|i| ProviderMessage::text(Role::User, format!("msg {i}")))
            .collect();
        let err = driver
            .run("sys".to_string(), messages, |_s, _m| async {
                Err::<u32, _>(TurnError::ContextLength { requested_tokens: None, model_max_tokens: None })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::ContextLength { .. }));
    }
}
