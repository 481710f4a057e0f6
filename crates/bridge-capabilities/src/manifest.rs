//! Static model manifest — process-wide table initialized at startup, the way
//! `skynet_agent::registry::KNOWN_PROVIDERS` lists well-known providers.
//! `CapabilityResolver` falls back to name heuristics for unlisted models.

use bridge_core::types::ModelCapabilities;

/// One manifest row: a known model id plus its capability flags and a
/// human-readable display name.
pub struct ManifestEntry {
    pub id: &'static str,
    pub display_name: &'static str,
    pub capabilities: ModelCapabilities,
}

pub const MODEL_MANIFEST: &[ManifestEntry] = &[
    ManifestEntry {
        id: "gpt-4o",
        display_name: "GPT-4o",
        capabilities: ModelCapabilities {
            supports_vision: true,
            supports_reasoning: false,
            supports_tool_calling: true,
            supports_web_search: true,
            supports_image_gen: false,
            supports_audio: true,
            context_window: 128_000,
        },
    },
    ManifestEntry {
        id: "gpt-4o-mini",
        display_name: "GPT-4o mini",
        capabilities: ModelCapabilities {
            supports_vision: true,
            supports_reasoning: false,
            supports_tool_calling: true,
            supports_web_search: false,
            supports_image_gen: false,
            supports_audio: false,
            context_window: 128_000,
        },
    },
    ManifestEntry {
        id: "o3",
        display_name: "o3",
        capabilities: ModelCapabilities {
            supports_vision: true,
            supports_reasoning: true,
            supports_tool_calling: true,
            supports_web_search: false,
            supports_image_gen: false,
            supports_audio: false,
            context_window: 200_000,
        },
    },
    ManifestEntry {
        id: "claude-opus-4-6",
        display_name: "Claude Opus",
        capabilities: ModelCapabilities {
            supports_vision: true,
            supports_reasoning: true,
            supports_tool_calling: true,
            supports_web_search: false,
            supports_image_gen: false,
            supports_audio: false,
            context_window: 200_000,
        },
    },
    ManifestEntry {
        id: "codex",
        display_name: "Codex (local)",
        capabilities: ModelCapabilities {
            supports_vision: false,
            supports_reasoning: true,
            supports_tool_calling: true,
            supports_web_search: false,
            supports_image_gen: false,
            supports_audio: false,
            context_window: 128_000,
        },
    },
];

pub fn lookup(model_id: &str) -> Option<&'static ManifestEntry> {
    MODEL_MANIFEST.iter().find(|e| e.id == model_id)
}

/// Name-heuristic inference for models absent from the manifest — §4.4.
pub fn infer(model_id: &str) -> ModelCapabilities {
    let lower = model_id.to_ascii_lowercase();
    let vision = ["gpt-4", "gpt-5", "claude", "gemini"]
        .iter()
        .any(|p| lower.starts_with(p))
        || lower.contains("vision");
    let tool_calling = ["gpt-", "claude", "gemini", "llama"]
        .iter()
        .any(|p| lower.contains(p));
    let reasoning = lower.starts_with('o') && lower.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
        || lower.contains("opus")
        || lower.contains("thinking");
    ModelCapabilities {
        supports_vision: vision,
        supports_reasoning: reasoning,
        supports_tool_calling: tool_calling,
        supports_web_search: false,
        supports_image_gen: lower.contains("image"),
        supports_audio: lower.contains("audio") || lower.contains("realtime"),
        context_window: 32_000,
    }
}

pub fn display_name(model_id: &str) -> String {
    match lookup(model_id) {
        Some(entry) => entry.display_name.to_string(),
        None => model_id.to_string(),
    }
}
