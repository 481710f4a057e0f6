//! Built-in provider registry — maps well-known provider ids to their API
//! endpoints and default models, so `LoginDefaults`/`Provider` config can
//! reference a short id instead of spelling out a base URL. Grounded in
//! `skynet_agent::registry::KNOWN_PROVIDERS`.

pub struct KnownProvider {
    pub id: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
    pub default_model: &'static str,
    /// True when this endpoint exposes the legacy Chat Completions surface
    /// as its primary API rather than Responses — routed accordingly by
    /// the caller even outside the audio/multimodal rule of §4.7.2.
    pub chat_completions_only: bool,
}

pub const KNOWN_PROVIDERS: &[KnownProvider] = &[
    KnownProvider {
        id: "openai",
        name: "OpenAI",
        base_url: "https://api.openai.com/v1",
        default_model: "gpt-4o",
        chat_completions_only: false,
    },
    KnownProvider {
        id: "azure-openai",
        name: "Azure OpenAI",
        base_url: "https://{resource}.openai.azure.com/openai",
        default_model: "gpt-4o",
        chat_completions_only: false,
    },
    KnownProvider {
        id: "openrouter",
        name: "OpenRouter",
        base_url: "https://openrouter.ai/api/v1",
        default_model: "openai/gpt-4o",
        chat_completions_only: true,
    },
    KnownProvider {
        id: "groq",
        name: "Groq",
        base_url: "https://api.groq.com/openai/v1",
        default_model: "llama-3.3-70b-versatile",
        chat_completions_only: true,
    },
    KnownProvider {
        id: "deepseek",
        name: "DeepSeek",
        base_url: "https://api.deepseek.com",
        default_model: "deepseek-chat",
        chat_completions_only: true,
    },
];

pub fn lookup(id: &str) -> Option<&'static KnownProvider> {
    KNOWN_PROVIDERS.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_openai() {
        assert_eq!(lookup("openai").unwrap().default_model, "gpt-4o");
    }

    #[test]
    fn lookup_unknown_is_none() {
        assert!(lookup("does-not-exist").is_none());
    }
}
