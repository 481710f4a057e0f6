//! Inbound message ingress — POST /webhooks/:source.
//!
//! Grounded in `skynet_gateway::http::webhooks::webhook_handler`: accept a
//! JSON payload, authenticate it, forward to the agent. Narrowed from the
//! teacher's per-source HMAC/bearer table (GitHub, Gmail, Slack...) to the
//! single bearer-token check `GatewayConfig::auth` already defines, since
//! this bridge has exactly one kind of inbound event: a chat-network message
//! needing a turn.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use bridge_core::config::AuthMode;
use bridge_core::types::PortalKey;
use bridge_turn::TurnRequest;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::app::AppState;

#[derive(Deserialize)]
pub struct InboundMessage {
    pub portal_id: String,
    pub source_event_id: String,
    pub body: String,
}

pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<InboundMessage>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state.config.gateway.auth, &headers) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized"})),
        ));
    }

    info!(source = %source, portal_id = %payload.portal_id, "webhook delivery accepted");

    let portal_key = PortalKey::new(payload.portal_id.clone(), state.login_id.clone());
    let portal = state.store.get_or_create(&portal_key).map_err(internal_error)?;
    let login = state
        .store
        .get_or_create_login(state.login_id.as_str(), state.login_provider)
        .map_err(internal_error)?;
    let agent = if portal.metadata.agent_id.is_empty() {
        None
    } else {
        state.agents.get(&portal.metadata.agent_id).map_err(internal_error)?
    };

    let req = TurnRequest {
        portal_key,
        login,
        agent,
        source_event_id: payload.source_event_id,
        latest_user_message: payload.body,
    };

    let engine = state.turn_engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.run_turn(req).await {
            warn!(error = %e, "turn failed");
        }
    });

    Ok(Json(json!({"ok": true})))
}

pub(crate) fn check_auth(auth: &bridge_core::config::AuthConfig, headers: &HeaderMap) -> bool {
    match auth.mode {
        AuthMode::None => true,
        AuthMode::Token => {
            let Some(expected) = auth.token.as_deref() else {
                return false;
            };
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t == expected)
                .unwrap_or(false)
        }
    }
}

fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    warn!(error = %e, "webhook handling failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "internal error"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::config::AuthConfig;

    fn header(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", value.parse().unwrap());
        headers
    }

    #[test]
    fn no_auth_mode_always_passes() {
        let auth = AuthConfig { mode: AuthMode::None, token: None };
        assert!(check_auth(&auth, &HeaderMap::new()));
    }

    #[test]
    fn token_mode_rejects_missing_header() {
        let auth = AuthConfig { mode: AuthMode::Token, token: Some("secret".to_string()) };
        assert!(!check_auth(&auth, &HeaderMap::new()));
    }

    #[test]
    fn token_mode_rejects_wrong_token() {
        let auth = AuthConfig { mode: AuthMode::Token, token: Some("secret".to_string()) };
        assert!(!check_auth(&auth, &header("Bearer wrong")));
    }

    #[test]
    fn token_mode_accepts_matching_bearer_token() {
        let auth = AuthConfig { mode: AuthMode::Token, token: Some("secret".to_string()) };
        assert!(check_auth(&auth, &header("Bearer secret")));
    }

    #[test]
    fn token_mode_with_no_configured_token_rejects_everything() {
        let auth = AuthConfig { mode: AuthMode::Token, token: None };
        assert!(!check_auth(&auth, &header("Bearer anything")));
    }
}
