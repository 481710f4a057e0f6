//! Display-name resolution for ghosts — §4.1.
//!
//! Pure functions: the agent preset/name lookup is injected by the caller
//! (`bridge-agents` owns `AgentDefinition`) so this crate has no dependency
//! on the agent store.

use bridge_capabilities::manifest;

pub fn model_display_name(model_id: &str) -> String {
    manifest::display_name(model_id)
}

/// `"{agent} · {model}"` — the one display-name rule `bridge-identity` can't
/// compute itself, since agent names live in `bridge-agents`.
pub fn agent_model_display_name(agent_name: &str, model_id: &str) -> String {
    format!("{} · {}", agent_name, model_display_name(model_id))
}
