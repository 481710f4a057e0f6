//! `RoomStateProtocol` — §4.6. Two custom state events keyed by the empty
//! state key: `room_capabilities` (bridge-bot-only, power level 100) and
//! `room_settings` (any member, power level 0), plus the
//! `update_portal_config` / `ModelSwitchChoreography` handling a settings
//! event triggers.

use bridge_capabilities::CapabilityResolver;
use bridge_chatnet::types::{MembershipChange, StateEventType, StatePowerLevel, TimelineEventType};
use bridge_chatnet::ChatNetwork;
use bridge_core::types::{ConversationMode, Portal, ReasoningEffort, UserLogin};
use serde::Serialize;
use tracing::instrument;

use crate::error::{PortalError, Result};
use crate::store::PortalStore;

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Power level a given custom state event requires to write — §4.6.
pub fn power_level_for(event: StatePowerLevel) -> u8 {
    match event {
        StatePowerLevel::BridgeOnly => 100,
        StatePowerLevel::AnyMember => 0,
    }
}

fn source_reason(source: bridge_capabilities::SettingSource) -> &'static str {
    use bridge_capabilities::SettingSource::*;
    match source {
        RoomOverride => "set explicitly on this room",
        UserDefault => "inherited from the login's default",
        ProviderConfig => "provider default",
        GlobalDefault => "bridge-wide default",
        ModelLimit => "clamped to the model's context window",
        AgentPolicy => "fixed by the room's agent",
    }
}

/// Build the `room_capabilities` event content — only the bridge may write
/// this event (§4.6).
pub fn capabilities_event(portal: &Portal, login: &UserLogin, provider_name: &str, available_tools: &[ToolInfo]) -> StateEventType {
    let model = CapabilityResolver::effective_model(&portal.metadata, login, "gpt-4o-mini");
    let prompt = CapabilityResolver::effective_system_prompt(&portal.metadata, login);
    let temperature = CapabilityResolver::effective_temperature(&portal.metadata, login);
    let reasoning = CapabilityResolver::effective_reasoning_effort(&portal.metadata, login);

    let content = serde_json::json!({
        "capabilities": portal.metadata.capabilities,
        "available_tools": available_tools,
        "reasoning_effort_options": ["low", "medium", "high", "xhigh"],
        "provider": provider_name,
        "effective_settings": {
            "model": {"value": model.value, "source": model.source, "reason": source_reason(model.source)},
            "prompt": {"value": prompt.value, "source": prompt.source, "reason": source_reason(prompt.source)},
            "temperature": {"value": temperature.value, "source": temperature.source, "reason": source_reason(temperature.source)},
            "reasoning": {"value": reasoning.value, "source": reasoning.source, "reason": source_reason(reasoning.source)},
        }
    });
    StateEventType::RoomCapabilities { content }
}

/// Build the `room_settings` event content — any member may write this
/// event (§4.6); it is a subset of `PortalMetadata`.
pub fn settings_event(portal: &Portal) -> StateEventType {
    let content = serde_json::json!({
        "model": portal.metadata.model,
        "system_prompt": portal.metadata.system_prompt,
        "temperature": portal.metadata.temperature,
        "max_context_messages": portal.metadata.max_context_messages,
        "max_completion_tokens": portal.metadata.max_completion_tokens,
        "reasoning_effort": portal.metadata.reasoning_effort,
        "conversation_mode": portal.metadata.conversation_mode,
        "agent_id": portal.metadata.agent_id,
    });
    StateEventType::RoomSettings { content }
}

/// Incoming `room_settings` write — only non-default fields are applied
/// (§4.6 step 2: "non-empty/non-zero").
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SettingsUpdate {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_context_messages: Option<u32>,
    pub max_completion_tokens: Option<u32>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub conversation_mode: Option<ConversationMode>,
    pub agent_id: Option<String>,
}

fn to_portal_err(e: bridge_chatnet::ChatNetworkError) -> PortalError {
    PortalError::ChatNetwork(e.to_string())
}

/// §4.6 `ModelSwitchChoreography`: shows a model transition as membership
/// changes in the room timeline while preserving invariant (1), the single
/// resident AI ghost.
pub struct ModelSwitchChoreography;

impl ModelSwitchChoreography {
    #[instrument(skip(network, portal))]
    pub async fn apply(network: &dyn ChatNetwork, portal: &mut Portal, old_model: &str, new_model: &str) -> Result<()> {
        let Some(room_id) = portal.room_id.clone() else {
            return Ok(());
        };

        if portal.metadata.agent_id.is_empty() {
            let login = &portal.key.receiver_login_id;
            let old_ghost = bridge_identity::model_ghost_id(login, old_model);
            let new_ghost = bridge_identity::model_ghost_id(login, new_model);
            network
                .set_membership(&room_id, MembershipChange::Leave { user_id: old_ghost })
                .await
                .map_err(to_portal_err)?;
            network
                .set_membership(
                    &room_id,
                    MembershipChange::Join {
                        user_id: new_ghost.clone(),
                        display_name: display_label(new_model),
                        marker: "model-switch".to_string(),
                    },
                )
                .await
                .map_err(to_portal_err)?;
            // Leave-then-join on the same room_id keeps exactly one ghost
            // resident, enforcing invariant (1) without a separate sweep.
            portal.other_user_id = new_ghost;
        } else {
            network
                .set_membership(
                    &room_id,
                    MembershipChange::UpdateExtras {
                        user_id: portal.other_user_id.clone(),
                        extras: serde_json::json!({"model": new_model}),
                    },
                )
                .await
                .map_err(to_portal_err)?;
        }

        let notice = format!("Switched from {} to {}.", display_label(old_model), display_label(new_model));
        network
            .send_timeline_event(&room_id, TimelineEventType::Notice { body: notice }, None)
            .await
            .map_err(to_portal_err)?;

        Ok(())
    }
}

fn display_label(model: &str) -> String {
    if model.is_empty() {
        "(default)".to_string()
    } else {
        bridge_capabilities::manifest::display_name(model)
    }
}

/// §4.6 steps 1-5: apply an incoming settings write, run the model-switch
/// choreography if needed, persist, and re-broadcast both state events.
///
/// The re-broadcast (step 5) is intentional even though the event just came
/// from a member write: it lets clients see the canonicalized values (e.g.
/// a clamped `max_context_messages`) rather than echoing back what they sent.
#[instrument(skip(store, network, portal, update, login, available_tools))]
pub async fn update_portal_config(
    store: &PortalStore,
    network: &dyn ChatNetwork,
    portal: &mut Portal,
    update: &SettingsUpdate,
    login: &UserLogin,
    provider_name: &str,
    available_tools: &[ToolInfo],
) -> Result<()> {
    let old_model = portal.metadata.model.clone();
    let mut working = portal.metadata.clone();
    let mut model_changed = false;
    let mut agent_changed = false;

    if let Some(v) = &update.model {
        if !v.is_empty() && *v != working.model {
            working.model = v.clone();
            model_changed = true;
        }
    }
    if let Some(v) = &update.system_prompt {
        if !v.is_empty() {
            working.system_prompt = v.clone();
        }
    }
    if let Some(v) = update.temperature {
        if v != 0.0 {
            working.temperature = v;
        }
    }
    if let Some(v) = update.max_context_messages {
        if v != 0 {
            working.max_context_messages = v;
        }
    }
    if let Some(v) = update.max_completion_tokens {
        if v != 0 {
            working.max_completion_tokens = v;
        }
    }
    if update.reasoning_effort.is_some() {
        working.reasoning_effort = update.reasoning_effort;
    }
    if let Some(v) = update.conversation_mode {
        working.conversation_mode = v;
    }
    if let Some(v) = &update.agent_id {
        if !v.is_empty() && *v != working.agent_id {
            working.agent_id = v.clone();
            agent_changed = true;
        }
    }
    if model_changed {
        working.capabilities = CapabilityResolver::resolve(&working.model);
    }

    // Boss-owned rooms are configuration-locked: any model/agent change is
    // dropped silently and the rest of the update never lands either, since
    // a boss room's identity must stay fixed for its entire lifetime.
    if portal.metadata.agent_id == "boss" && (model_changed || agent_changed) {
        return Ok(());
    }

    portal.metadata = working;

    if model_changed {
        ModelSwitchChoreography::apply(network, portal, &old_model, &portal.metadata.model.clone()).await?;
    }

    store.save(portal)?;

    if let Some(room_id) = portal.room_id.clone() {
        network
            .send_state_event(&room_id, capabilities_event(portal, login, provider_name, available_tools))
            .await
            .map_err(to_portal_err)?;
        network
            .send_state_event(&room_id, settings_event(portal))
            .await
            .map_err(to_portal_err)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_chatnet::InMemoryChatNetwork;
    use bridge_core::types::{LoginId, PortalKey, Provider};
    use rusqlite::Connection;

    async fn portal_in_room(network: &InMemoryChatNetwork) -> Portal {
        use bridge_chatnet::types::RoomCreateRequest;
        let mut portal = Portal::new(PortalKey::new("p1", LoginId::from("login1")));
        portal.metadata.model = "gpt-4o-mini".to_string();
        portal.other_user_id = bridge_identity::model_ghost_id(&portal.key.receiver_login_id, &portal.metadata.model);
        let room_id = network
            .create_room(RoomCreateRequest {
                name: "chat-0".to_string(),
                room_type: "dm",
                other_user_id: portal.other_user_id.clone(),
            })
            .await
            .unwrap();
        portal.room_id = Some(room_id);
        portal
    }

    #[tokio::test]
    async fn model_switch_leaves_old_ghost_and_joins_new_one() {
        let network = InMemoryChatNetwork::new();
        let mut portal = portal_in_room(&network).await;
        let room_id = portal.room_id.clone().unwrap();

        ModelSwitchChoreography::apply(&network, &mut portal, "gpt-4o-mini", "gpt-4o").await.unwrap();

        let residents = network.residents(&room_id);
        let login = LoginId::from("login1");
        assert_eq!(residents, vec![bridge_identity::model_ghost_id(&login, "gpt-4o")]);
        assert_eq!(portal.other_user_id, bridge_identity::model_ghost_id(&login, "gpt-4o"));
    }

    #[tokio::test]
    async fn update_portal_config_applies_nonzero_fields_and_rebroadcasts() {
        let conn = Connection::open_in_memory().unwrap();
        let store = PortalStore::new(conn).unwrap();
        let network = InMemoryChatNetwork::new();
        let mut portal = portal_in_room(&network).await;
        store.save(&portal).unwrap();
        let login = UserLogin::new("login1", Provider::Openai);

        let update = SettingsUpdate {
            model: Some("gpt-4o".to_string()),
            temperature: Some(0.7),
            ..Default::default()
        };

        update_portal_config(&store, &network, &mut portal, &update, &login, "openai", &[]).await.unwrap();

        assert_eq!(portal.metadata.model, "gpt-4o");
        assert_eq!(portal.metadata.temperature, 0.7);
        assert_eq!(network.state.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn boss_room_rejects_model_changes_silently() {
        let conn = Connection::open_in_memory().unwrap();
        let store = PortalStore::new(conn).unwrap();
        let network = InMemoryChatNetwork::new();
        let mut portal = portal_in_room(&network).await;
        portal.metadata.agent_id = "boss".to_string();
        store.save(&portal).unwrap();
        let login = UserLogin::new("login1", Provider::Openai);

        let update = SettingsUpdate {
            model: Some("gpt-4o".to_string()),
            ..Default::default()
        };
        update_portal_config(&store, &network, &mut portal, &update, &login, "openai", &[]).await.unwrap();

        assert_eq!(portal.metadata.model, "gpt-4o-mini");
        assert!(network.state.lock().unwrap().is_empty());
    }
}
