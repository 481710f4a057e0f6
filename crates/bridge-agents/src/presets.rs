//! Built-in agent presets — a process-wide immutable table, the way
//! `skynet_agent::registry::KNOWN_PROVIDERS` lists well-known providers
//! (SPEC_FULL "Process-wide singletons").

use crate::types::{AgentDefinition, AgentModelConfig, ResponseMode};

const EPOCH: &str = "1970-01-01T00:00:00Z";

/// The default welcome-chat agent (scenario 1 of §8: body begins
/// `"Hello! I'm Beep."`).
pub fn beep() -> AgentDefinition {
    AgentDefinition {
        id: "beep".to_string(),
        name: "Beep".to_string(),
        description: "General-purpose default assistant.".to_string(),
        model: AgentModelConfig {
            primary: "gpt-4o-mini".to_string(),
            fallbacks: vec!["gpt-4o".to_string()],
        },
        system_prompt: "You are Beep, a friendly and concise assistant.".to_string(),
        tools_profile: "default".to_string(),
        response_mode: ResponseMode::Natural,
        avatar_url: String::new(),
        is_preset: true,
        created_at: EPOCH.to_string(),
        updated_at: EPOCH.to_string(),
    }
}

/// The meta-agent for the Builder room (§4.5 `ensure_builder_room`, §3
/// invariant 4): elevated tool access, locked-down room overrides.
pub fn boss() -> AgentDefinition {
    AgentDefinition {
        id: "boss".to_string(),
        name: "Boss".to_string(),
        description: "Manages other agents and rooms from the Builder room.".to_string(),
        model: AgentModelConfig {
            primary: "gpt-4o".to_string(),
            fallbacks: vec![],
        },
        system_prompt: "You are the Boss agent. You manage other agents and chats for this user."
            .to_string(),
        tools_profile: "boss".to_string(),
        response_mode: ResponseMode::Natural,
        avatar_url: String::new(),
        is_preset: true,
        created_at: EPOCH.to_string(),
        updated_at: EPOCH.to_string(),
    }
}

pub fn built_in_presets() -> Vec<AgentDefinition> {
    vec![beep(), boss()]
}
