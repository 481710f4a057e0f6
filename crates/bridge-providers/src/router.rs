//! Provider fallback routing — §4.8 "fallback chain": when the primary
//! model's provider returns a fallback-eligible error, retry the same
//! request against the next `(provider, model)` candidate in
//! `AgentModelConfig.fallbacks` before giving up.
//!
//! Grounded in `skynet_agent::runtime`'s provider-selection loop, which
//! tries `session.provider` then walks a static fallback list on error.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// One step of a fallback chain: which registered provider to use, and
/// which model id to substitute into the request before sending.
#[derive(Debug, Clone)]
pub struct RouteCandidate {
    pub provider_name: String,
    pub model: String,
}

pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(name).cloned()
    }

    /// Errors that should advance to the next fallback candidate rather than
    /// surface immediately — auth/billing/fatal errors are excluded because
    /// switching provider won't help (§7's error-category table).
    fn is_fallback_eligible(err: &ProviderError) -> bool {
        matches!(
            err,
            ProviderError::RateLimited { .. } | ProviderError::Unavailable(_)
        ) || matches!(err, ProviderError::Api { status, .. } if *status >= 500)
    }

    /// Try `candidates` in order, substituting each candidate's model into
    /// `req` before sending. Returns the first success, or the last error if
    /// every candidate is exhausted.
    pub async fn send_with_fallback(
        &self,
        candidates: &[RouteCandidate],
        req: &ChatRequest,
    ) -> Result<(ChatResponse, String), ProviderError> {
        let mut last_err: Option<ProviderError> = None;
        for (idx, candidate) in candidates.iter().enumerate() {
            let Some(provider) = self.providers.get(&candidate.provider_name) else {
                warn!(provider = %candidate.provider_name, "fallback candidate not registered");
                continue;
            };
            let mut attempt = req.clone();
            attempt.model = candidate.model.clone();
            match provider.send(&attempt).await {
                Ok(resp) => return Ok((resp, candidate.provider_name.clone())),
                Err(err) if idx + 1 < candidates.len() && Self::is_fallback_eligible(&err) => {
                    warn!(
                        provider = %candidate.provider_name,
                        model = %candidate.model,
                        error = %err,
                        "provider failed, trying next fallback"
                    );
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or(ProviderError::Unavailable("no fallback candidates".into())))
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, Message, Role};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyProvider {
        name: String,
        fail_times: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            if self.fail_times.fetch_sub(1, Ordering::SeqCst) > 0 {
                return Err(ProviderError::Unavailable("flaky".into()));
            }
            Ok(ChatResponse {
                content: format!("ok from {} on {}", self.name, req.model),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                finish_reason: "stop".into(),
                tool_calls: Vec::new(),
                response_id: None,
            })
        }
    }

    fn req() -> ChatRequest {
        ChatRequest {
            model: "placeholder".into(),
            system: String::new(),
            messages: vec![Message::text(Role::User, "hi")],
            max_tokens: 100,
            temperature: 0.7,
            stream: false,
            tools: Vec::new(),
            previous_response_id: None,
            function_call_outputs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn falls_back_to_next_candidate_on_transient_error() {
        let mut router = ProviderRouter::new();
        router.register(Arc::new(FlakyProvider {
            name: "primary".into(),
            fail_times: AtomicUsize::new(1),
        }));
        router.register(Arc::new(FlakyProvider {
            name: "fallback".into(),
            fail_times: AtomicUsize::new(0),
        }));
        let candidates = vec![
            RouteCandidate { provider_name: "primary".into(), model: "gpt-4o".into() },
            RouteCandidate { provider_name: "fallback".into(), model: "gpt-4o-mini".into() },
        ];
        let (resp, used) = router.send_with_fallback(&candidates, &req()).await.unwrap();
        assert_eq!(used, "fallback");
        assert!(resp.content.contains("fallback"));
    }

    #[tokio::test]
    async fn exhausting_all_candidates_returns_last_error() {
        let mut router = ProviderRouter::new();
        router.register(Arc::new(FlakyProvider {
            name: "only".into(),
            fail_times: AtomicUsize::new(99),
        }));
        let candidates = vec![RouteCandidate { provider_name: "only".into(), model: "m".into() }];
        let err = router.send_with_fallback(&candidates, &req()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
