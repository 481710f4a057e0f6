//! `TurnError` and the §7 error-categorization table. Grounded in
//! `skynet_agent::runtime`'s error-to-user-facing-notice mapping, widened
//! with the two retry sentinels §4.8 names explicitly.

use bridge_providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("chat network error: {0}")]
    ChatNetwork(String),

    #[error("portal store error: {0}")]
    Portal(#[from] bridge_portals::PortalError),

    #[error("context length exceeded (requested {requested_tokens:?}, model max {model_max_tokens:?})")]
    ContextLength {
        requested_tokens: Option<u32>,
        model_max_tokens: Option<u32>,
    },

    /// A provider failure that happened after the initial streaming event
    /// was already sent — §4.8: retrying must not switch API surface or
    /// re-send a duplicate initial event once the timeline already shows one.
    #[error("turn failed mid-flight: {0}")]
    NonFallback(Box<TurnError>),

    #[error("tool '{name}' is not registered")]
    UnknownTool { name: String },

    #[error("turn cancelled")]
    Cancelled,
}

impl From<bridge_chatnet::ChatNetworkError> for TurnError {
    fn from(e: bridge_chatnet::ChatNetworkError) -> Self {
        TurnError::ChatNetwork(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TurnError>;

/// Non-context-length error categories of §7, driving how the bridge
/// surfaces a failure without retrying in a way that can't succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Flip `logged_in=false` and stop retrying entirely.
    Auth,
    /// Transient-disconnect state with a stable error code; no immediate retry.
    Billing,
    RateLimit,
    Overloaded,
    /// Anything else: retriable message-status, user-facing text via `format_user_facing_error`.
    Other,
}

fn is_context_length_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("context_length") || lower.contains("context length") || lower.contains("token")
}

/// Recognize a provider error matching `/context_length|token/` (§4.8) and
/// surface it as the retry-driving sentinel rather than a terminal failure.
pub fn classify_stream_error(message: &str) -> Option<TurnError> {
    if is_context_length_message(message) {
        Some(TurnError::ContextLength {
            requested_tokens: None,
            model_max_tokens: None,
        })
    } else {
        None
    }
}

/// §7's non-context error table, used once a provider call has already
/// failed outright (not mid-stream).
pub fn classify(err: &ProviderError) -> ErrorCategory {
    match err {
        ProviderError::Api { status, message } => {
            if *status == 401 || *status == 403 {
                ErrorCategory::Auth
            } else if *status == 402 {
                ErrorCategory::Billing
            } else if *status == 429 {
                ErrorCategory::RateLimit
            } else if *status == 503 && message.to_ascii_lowercase().contains("overload") {
                ErrorCategory::Overloaded
            } else {
                ErrorCategory::Other
            }
        }
        ProviderError::RateLimited { .. } => ErrorCategory::RateLimit,
        ProviderError::Unavailable(msg) if msg.to_ascii_lowercase().contains("overload") => ErrorCategory::Overloaded,
        _ => ErrorCategory::Other,
    }
}

/// §7 `FormatUserFacingError`: a short, non-leaky message safe to show in
/// the room's error notice.
pub fn format_user_facing_error(err: &ProviderError) -> String {
    match classify(err) {
        ErrorCategory::Auth => "Authentication with the model provider failed. Please reconnect your account.".to_string(),
        ErrorCategory::Billing => "The model provider reported a billing issue with this account.".to_string(),
        ErrorCategory::RateLimit => "The model provider is rate-limiting this account right now. Try again shortly.".to_string(),
        ErrorCategory::Overloaded => "The model provider is temporarily overloaded. Try again shortly.".to_string(),
        ErrorCategory::Other => format!("Something went wrong talking to the model: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_context_length_phrasing() {
        assert!(classify_stream_error("error: context_length_exceeded").is_some());
        assert!(classify_stream_error("maximum context length is 8192 tokens").is_some());
        assert!(classify_stream_error("too many requests").is_none());
    }

    #[test]
    fn classifies_auth_and_rate_limit_status_codes() {
        let auth = ProviderError::Api { status: 401, message: "unauthorized".into() };
        assert_eq!(classify(&auth), ErrorCategory::Auth);
        let rate = ProviderError::RateLimited { retry_after_ms: 500 };
        assert_eq!(classify(&rate), ErrorCategory::RateLimit);
    }
}
