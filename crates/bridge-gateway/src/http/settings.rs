//! Room-settings confirmation loop — PUT /portals/:portal_id/settings.
//! Grounded in §4.6 `update_portal_config`: apply the member's write, run
//! the model-switch choreography if needed, then re-broadcast the
//! canonicalized `room_capabilities`/`room_settings` state events so the
//! caller sees the values actually applied rather than an echo of its input.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bridge_core::types::PortalKey;
use bridge_portals::state::{settings_event, update_portal_config, SettingsUpdate, ToolInfo};
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;

pub async fn settings_handler(
    State(state): State<Arc<AppState>>,
    Path(portal_id): Path<String>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let portal_key = PortalKey::new(portal_id, state.login_id.clone());
    let mut portal = state.store.get_or_create(&portal_key).map_err(internal_error)?;
    let login = state
        .store
        .get_or_create_login(state.login_id.as_str(), state.login_provider)
        .map_err(internal_error)?;

    let available_tools: Vec<ToolInfo> = state
        .tools
        .allowed(&portal.metadata.tool_policy)
        .iter()
        .map(|t| ToolInfo { name: t.name().to_string(), description: t.description().to_string() })
        .collect();

    update_portal_config(
        &state.store,
        state.network.as_ref(),
        &mut portal,
        &update,
        &login,
        crate::app::router_name_for(state.login_provider),
        &available_tools,
    )
    .await
    .map_err(internal_error)?;

    let Some(event) = content_of(settings_event(&portal)) else {
        return Ok(Json(json!({"ok": true})));
    };
    Ok(Json(json!({"ok": true, "settings": event})))
}

fn content_of(event: bridge_chatnet::types::StateEventType) -> Option<Value> {
    match event {
        bridge_chatnet::types::StateEventType::RoomSettings { content } => Some(content),
        bridge_chatnet::types::StateEventType::RoomCapabilities { content } => Some(content),
        bridge_chatnet::types::StateEventType::RoomName { .. } => None,
    }
}

fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    warn!(error = %e, "settings update failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "internal error"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_chatnet::types::StateEventType;

    #[test]
    fn room_settings_and_capabilities_events_carry_their_content() {
        let content = json!({"model": "gpt-4o"});
        assert_eq!(content_of(StateEventType::RoomSettings { content: content.clone() }), Some(content.clone()));
        assert_eq!(content_of(StateEventType::RoomCapabilities { content: content.clone() }), Some(content));
    }

    #[test]
    fn room_name_event_has_no_settings_content() {
        assert_eq!(content_of(StateEventType::RoomName { name: "chat".to_string() }), None);
    }
}
