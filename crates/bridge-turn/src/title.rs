//! §4.9 fire-and-forget title generation: schedule a bounded one-shot job
//! right after a turn completes, then — once the scheduler fires it back —
//! actually call the cheap model and rename the room.

use std::sync::Arc;

use bridge_chatnet::types::StateEventType;
use bridge_chatnet::ChatNetwork;
use bridge_core::types::{Portal, Provider, RoomId};
use bridge_portals::PortalStore;
use bridge_providers::{ChatRequest, LlmProvider, Message as ProviderMessage, Role};
use bridge_scheduler::{Schedule, SchedulerHandle, TitleGenerationAction};
use tracing::warn;

use crate::error::{Result, TurnError};

const MAX_TITLE_TOKENS: u32 = 20;
const MAX_TITLE_CHARS: usize = 50;

fn is_title_eligible(portal: &Portal, login_provider: Provider) -> bool {
    login_provider == Provider::Beeper && !portal.metadata.title_generated
}

/// Queue a `title_generation` job for `portal` if it's eligible, to be
/// delivered back through `dispatch::run` moments later. Never blocks the
/// turn that triggered it.
pub fn schedule(
    scheduler: &dyn SchedulerHandle,
    portal: &Portal,
    login_provider: Provider,
) -> Result<()> {
    if !is_title_eligible(portal, login_provider) {
        return Ok(());
    }
    let Some(room_id) = portal.room_id.as_ref() else {
        return Ok(());
    };
    let action = TitleGenerationAction {
        room_id: room_id.0.clone(),
        portal_id: portal.key.portal_id.clone(),
    };
    let action_json = serde_json::to_string(&action).map_err(|e| TurnError::UnknownTool {
        name: format!("title_generation payload encode failed: {e}"),
    })?;
    scheduler
        .add_job(
            "title_generation",
            Schedule::Once { at: chrono::Utc::now() + chrono::Duration::milliseconds(500) },
            &action_json,
        )
        .map_err(|e| TurnError::ChatNetwork(format!("scheduling title generation failed: {e}")))?;
    Ok(())
}

fn strip_quotes(s: &str) -> String {
    s.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string()
}

fn clamp_title(s: &str) -> String {
    if s.chars().count() <= MAX_TITLE_CHARS {
        s.to_string()
    } else {
        s.chars().take(MAX_TITLE_CHARS).collect()
    }
}

/// The actual work a delivered `title_generation` job performs: summarize
/// the first exchange into a short title, set `m.room.name`, and mark the
/// portal so this never runs twice for the same room.
pub async fn generate(
    store: &PortalStore,
    network: &Arc<dyn ChatNetwork>,
    provider: &dyn LlmProvider,
    title_generation_model: &str,
    login_id: &bridge_core::types::LoginId,
    action: &TitleGenerationAction,
) -> Result<()> {
    let key = bridge_core::types::PortalKey::new(action.portal_id.clone(), login_id.clone());
    let Some(mut portal) = store.get(&key)? else {
        return Ok(());
    };
    if portal.metadata.title_generated {
        return Ok(());
    }
    let Some(room_id) = portal.room_id.clone() else {
        return Ok(());
    };

    let history = store.messages_for_portal(&key, 4)?;
    let transcript: String = history
        .iter()
        .map(|m| format!("{}: {}", m.metadata.role, m.metadata.body))
        .collect::<Vec<_>>()
        .join("\n");
    if transcript.trim().is_empty() {
        return Ok(());
    }

    let req = ChatRequest {
        model: title_generation_model.to_string(),
        system: "Write a short title (max 6 words) for this conversation. No quotes, no punctuation at the end, no preamble.".to_string(),
        messages: vec![ProviderMessage::text(Role::User, transcript)],
        max_tokens: MAX_TITLE_TOKENS,
        temperature: 0.5,
        stream: false,
        tools: Vec::new(),
        previous_response_id: None,
        function_call_outputs: Vec::new(),
    };

    let resp = match provider.send(&req).await {
        Ok(r) => r,
        Err(e) => {
            warn!(portal = %key, error = %e, "title generation call failed");
            return Ok(());
        }
    };

    let title = clamp_title(&strip_quotes(&resp.content));
    if title.is_empty() {
        return Ok(());
    }

    network
        .send_state_event(&RoomId(room_id.0.clone()), StateEventType::RoomName { name: title.clone() })
        .await?;

    portal.metadata.title = title;
    portal.metadata.title_generated = true;
    store.save(&portal)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_surrounding_quotes() {
        assert_eq!(strip_quotes("\"Rust help\""), "Rust help");
    }

    #[test]
    fn clamps_to_max_chars() {
        let long = "x".repeat(80);
        assert_eq!(clamp_title(&long).len(), MAX_TITLE_CHARS);
    }

    #[test]
    fn only_beeper_logins_not_yet_titled_are_eligible() {
        let mut portal = Portal::new(bridge_core::types::PortalKey::new(
            "p1",
            bridge_core::types::LoginId::from("l1"),
        ));
        assert!(is_title_eligible(&portal, Provider::Beeper));
        assert!(!is_title_eligible(&portal, Provider::Openai));
        portal.metadata.title_generated = true;
        assert!(!is_title_eligible(&portal, Provider::Beeper));
    }
}
