use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    #[default]
    Natural,
    Raw,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentModelConfig {
    pub primary: String,
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

/// A configured persona: system prompt, model, tool policy, display identity — §4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub model: AgentModelConfig,
    pub system_prompt: String,
    pub tools_profile: String,
    pub response_mode: ResponseMode,
    pub avatar_url: String,
    pub is_preset: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Ids that can never be assigned to a user-defined agent — §4.3.
pub const RESERVED_AGENT_IDS: &[&str] = &["none", "clear", "boss"];

/// `true` iff `id` matches `[a-z0-9-]+` — §4.3.
pub fn is_valid_agent_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
