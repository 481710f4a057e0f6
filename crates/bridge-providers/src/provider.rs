//! Unified request/response shapes and the `LlmProvider` trait — §6 "Provider
//! adapters (input to TurnEngine)". Grounded in `skynet_agent::provider`,
//! generalized from a plain-text `Message` to the multimodal content-part
//! union the turn engine needs for §4.7.1/§4.7.2.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::stream::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One part of a multimodal message — the "unified chat completion message"
/// value of §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String, detail: String },
    File { filename: String, data_url: String },
    Audio { format: String, data_b64: String },
}

impl ContentPart {
    pub fn is_audio(&self) -> bool {
        matches!(self, ContentPart::Audio { .. })
    }

    pub fn is_non_audio_multimodal(&self) -> bool {
        matches!(self, ContentPart::ImageUrl { .. } | ContentPart::File { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Message {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ContentPart::Text { text: text.into() }],
        }
    }

    pub fn plain_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn has_audio(&self) -> bool {
        self.parts.iter().any(|p| p.is_audio())
    }

    pub fn has_non_audio_multimodal(&self) -> bool {
        self.parts.iter().any(|p| p.is_non_audio_multimodal())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// §4.7.2 "API surface selection": which wire format a request should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSurface {
    ChatCompletions,
    Responses,
}

/// Is `messages` destined for `ChatCompletions` or `Responses`, given
/// `is_aggregator` — the provider-identity input to the §4.7.2 rule.
pub fn select_api_surface(messages: &[Message], is_aggregator: bool) -> ApiSurface {
    let has_audio = messages.iter().any(|m| m.has_audio());
    if has_audio {
        return ApiSurface::ChatCompletions;
    }
    let has_multimodal = messages.iter().any(|m| m.has_non_audio_multimodal());
    if has_multimodal && is_aggregator {
        return ApiSurface::ChatCompletions;
    }
    ApiSurface::Responses
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    pub tools: Vec<ToolDefinition>,
    /// Set when resuming via `last_response_id` (§4.7.1 "responses" mode).
    pub previous_response_id: Option<String>,
    /// Pending tool outputs for a continuation call — §4.7.4.
    pub function_call_outputs: Vec<FunctionCallOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallOutput {
    pub call_id: String,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub finish_reason: String,
    pub tool_calls: Vec<ToolCall>,
    pub response_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Common interface for every LLM provider (OpenAI-compatible HTTP,
/// aggregator, and the local `codex` subprocess runtime) — §6.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// True for stateless aggregators that need the full conversation
    /// resubmitted on every call rather than a `previous_response_id` cursor
    /// (§4.7.4 "For stateless providers").
    fn is_stateless(&self) -> bool {
        false
    }

    /// True when this provider is the chat-network aggregator named in
    /// §4.7.2's multimodal routing rule.
    fn is_aggregator(&self) -> bool {
        false
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Stream response events through a channel. Default falls back to
    /// non-streaming `send`, emitting one `TextDelta` then `ResponseCompleted`.
    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let resp = self.send(req).await?;
        let _ = tx
            .send(StreamEvent::TextDelta {
                content: resp.content,
            })
            .await;
        let _ = tx
            .send(StreamEvent::ResponseCompleted {
                status: "completed".to_string(),
                response_id: resp.response_id.unwrap_or_default(),
                output: Vec::new(),
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_forces_chat_completions_even_on_aggregator() {
        let msgs = vec![Message {
            role: Role::User,
            parts: vec![ContentPart::Audio {
                format: "wav".into(),
                data_b64: "AA==".into(),
            }],
        }];
        assert_eq!(select_api_surface(&msgs, true), ApiSurface::ChatCompletions);
        assert_eq!(select_api_surface(&msgs, false), ApiSurface::ChatCompletions);
    }

    #[test]
    fn non_audio_multimodal_on_aggregator_uses_chat_completions() {
        let msgs = vec![Message {
            role: Role::User,
            parts: vec![ContentPart::ImageUrl {
                url: "https://x/y.png".into(),
                detail: "auto".into(),
            }],
        }];
        assert_eq!(select_api_surface(&msgs, true), ApiSurface::ChatCompletions);
    }

    #[test]
    fn non_audio_multimodal_off_aggregator_uses_responses() {
        let msgs = vec![Message {
            role: Role::User,
            parts: vec![ContentPart::ImageUrl {
                url: "https://x/y.png".into(),
                detail: "auto".into(),
            }],
        }];
        assert_eq!(select_api_surface(&msgs, false), ApiSurface::Responses);
    }

    #[test]
    fn plain_text_defaults_to_responses() {
        let msgs = vec![Message::text(Role::User, "hi")];
        assert_eq!(select_api_surface(&msgs, true), ApiSurface::Responses);
    }
}
