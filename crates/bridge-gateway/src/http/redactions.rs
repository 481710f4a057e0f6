//! Inbound redaction ingress — DELETE /portals/:portal_id/messages/:message_id.
//! §8 I7: a chat-network delete of a user message removes the row from the
//! message log and emits a notice into the room. Auth and payload shape
//! mirror the webhook endpoint since this is the same kind of inbound
//! chat-network event, just a deletion instead of a new message.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use bridge_core::types::PortalKey;
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;
use crate::http::webhooks::check_auth;

pub async fn redaction_handler(
    State(state): State<Arc<AppState>>,
    Path((portal_id, message_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state.config.gateway.auth, &headers) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized"})),
        ));
    }

    let portal_key = PortalKey::new(portal_id, state.login_id.clone());
    bridge_portals::redact_message(&state.store, state.network.as_ref(), &portal_key, &message_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({"ok": true})))
}

fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    warn!(error = %e, "redaction handling failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "internal error"})))
}
