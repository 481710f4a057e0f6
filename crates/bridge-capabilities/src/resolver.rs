//! `CapabilityResolver` — §4.4. Resolves a model id to its capability record
//! and resolves per-room effective settings with source attribution.

use bridge_core::types::{ModelCapabilities, PortalMetadata, ReasoningEffort, UserLogin};
use serde::Serialize;

use crate::manifest;

/// Where an effective setting's value ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingSource {
    RoomOverride,
    UserDefault,
    ProviderConfig,
    GlobalDefault,
    ModelLimit,
    AgentPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveSetting<T> {
    pub value: T,
    pub source: SettingSource,
}

pub struct CapabilityResolver;

impl CapabilityResolver {
    /// §4.4: manifest lookup, else name-heuristic inference.
    pub fn resolve(model_id: &str) -> ModelCapabilities {
        manifest::lookup(model_id)
            .map(|e| e.capabilities.clone())
            .unwrap_or_else(|| manifest::infer(model_id))
    }

    /// Strip a routing prefix (`openai/`, `openrouter/`) — §4.4 `effective_model_for_api`.
    pub fn effective_model_for_api(model_id: &str) -> &str {
        for prefix in ["openai/", "openrouter/"] {
            if let Some(stripped) = model_id.strip_prefix(prefix) {
                return stripped;
            }
        }
        model_id
    }

    /// First non-empty model id from portal -> login default -> global default,
    /// reporting which tier won.
    pub fn effective_model(
        portal: &PortalMetadata,
        login: &UserLogin,
        global_default: &str,
    ) -> EffectiveSetting<String> {
        if !portal.model.is_empty() {
            return EffectiveSetting {
                value: portal.model.clone(),
                source: SettingSource::RoomOverride,
            };
        }
        if !login.defaults.model.is_empty() {
            return EffectiveSetting {
                value: login.defaults.model.clone(),
                source: SettingSource::UserDefault,
            };
        }
        EffectiveSetting {
            value: global_default.to_string(),
            source: SettingSource::GlobalDefault,
        }
    }

    pub fn effective_system_prompt(
        portal: &PortalMetadata,
        login: &UserLogin,
    ) -> EffectiveSetting<String> {
        if !portal.agent_prompt.is_empty() {
            return EffectiveSetting {
                value: portal.agent_prompt.clone(),
                source: SettingSource::AgentPolicy,
            };
        }
        if !portal.system_prompt.is_empty() {
            return EffectiveSetting {
                value: portal.system_prompt.clone(),
                source: SettingSource::RoomOverride,
            };
        }
        if !login.defaults.system_prompt.is_empty() {
            return EffectiveSetting {
                value: login.defaults.system_prompt.clone(),
                source: SettingSource::UserDefault,
            };
        }
        EffectiveSetting {
            value: String::new(),
            source: SettingSource::GlobalDefault,
        }
    }

    pub fn effective_temperature(
        portal: &PortalMetadata,
        login: &UserLogin,
    ) -> EffectiveSetting<f32> {
        if portal.temperature != 0.0 {
            return EffectiveSetting {
                value: portal.temperature,
                source: SettingSource::RoomOverride,
            };
        }
        if login.defaults.temperature != 0.0 {
            return EffectiveSetting {
                value: login.defaults.temperature,
                source: SettingSource::UserDefault,
            };
        }
        EffectiveSetting {
            value: 1.0,
            source: SettingSource::ProviderConfig,
        }
    }

    pub fn effective_reasoning_effort(
        portal: &PortalMetadata,
        login: &UserLogin,
    ) -> EffectiveSetting<Option<ReasoningEffort>> {
        if let Some(effort) = portal.reasoning_effort {
            return EffectiveSetting {
                value: Some(effort),
                source: SettingSource::RoomOverride,
            };
        }
        if let Some(effort) = login.defaults.reasoning_effort {
            return EffectiveSetting {
                value: Some(effort),
                source: SettingSource::UserDefault,
            };
        }
        EffectiveSetting {
            value: None,
            source: SettingSource::GlobalDefault,
        }
    }

    /// Clamp `max_context_messages` to the 1..100 range named in §3, falling
    /// back to the model's own context-window-derived cap when the room's
    /// value would be unreasonable for the model (`ModelLimit` source).
    pub fn effective_max_context_messages(
        portal: &PortalMetadata,
        capabilities: &ModelCapabilities,
    ) -> EffectiveSetting<u32> {
        let requested = portal.max_context_messages.clamp(1, 100);
        let ceiling = (capabilities.context_window / 500).clamp(1, 100);
        if requested > ceiling {
            EffectiveSetting {
                value: ceiling,
                source: SettingSource::ModelLimit,
            }
        } else {
            EffectiveSetting {
                value: requested,
                source: SettingSource::RoomOverride,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::types::Provider;

    #[test]
    fn strips_routing_prefix() {
        assert_eq!(
            CapabilityResolver::effective_model_for_api("openai/gpt-4o"),
            "gpt-4o"
        );
        assert_eq!(
            CapabilityResolver::effective_model_for_api("openrouter/anthropic/claude"),
            "anthropic/claude"
        );
        assert_eq!(CapabilityResolver::effective_model_for_api("gpt-4o"), "gpt-4o");
    }

    #[test]
    fn effective_model_falls_through_tiers() {
        let portal = PortalMetadata::default();
        let mut login = UserLogin::new("l1", Provider::Openai);
        let resolved = CapabilityResolver::effective_model(&portal, &login, "gpt-4o-mini");
        assert_eq!(resolved.source, SettingSource::GlobalDefault);
        assert_eq!(resolved.value, "gpt-4o-mini");

        login.defaults.model = "o3".to_string();
        let resolved = CapabilityResolver::effective_model(&portal, &login, "gpt-4o-mini");
        assert_eq!(resolved.source, SettingSource::UserDefault);

        let mut portal = portal;
        portal.model = "claude-3-opus".to_string();
        let resolved = CapabilityResolver::effective_model(&portal, &login, "gpt-4o-mini");
        assert_eq!(resolved.source, SettingSource::RoomOverride);
        assert_eq!(resolved.value, "claude-3-opus");
    }

    #[test]
    fn known_model_resolves_from_manifest() {
        let caps = CapabilityResolver::resolve("gpt-4o");
        assert!(caps.supports_vision);
        assert!(caps.supports_tool_calling);
    }

    #[test]
    fn unknown_model_uses_heuristics() {
        let caps = CapabilityResolver::resolve("o5-preview");
        assert!(caps.supports_reasoning);
    }
}
