//! Deterministic synthesis and parsing of chat-network user ids — §4.1.
//!
//! Every id is pure string manipulation over `(login, model_or_agent)`; no
//! database lookup is involved, mirroring `skynet_users::identity`'s split
//! between pure id logic and the row-backed `UserResolver`.

use bridge_core::types::LoginId;

/// Lossy-but-stable transform of a raw model id into the path-safe slug used
/// inside ghost ids (e.g. `"openai/gpt-4o"` -> `"openai-gpt-4o"`).
pub fn slug(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// The parsed identity of an "ai-" ghost or human user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedIdentity {
    Model { login: String, model_slug: String },
    Agent { login: String, agent_id: String },
    AgentModel {
        login: String,
        agent_id: String,
        model_slug: String,
    },
    Human { login: String },
}

pub fn model_ghost_id(login: &LoginId, model: &str) -> String {
    format!("ai-{}:model:{}", login, slug(model))
}

pub fn agent_ghost_id(login: &LoginId, agent: &str) -> String {
    format!("ai-{}:agent:{}", login, agent)
}

pub fn agent_model_ghost_id(login: &LoginId, agent: &str, model: &str) -> String {
    format!("ai-{}:agent-model:{}:{}", login, agent, slug(model))
}

pub fn human_user_id(login: &LoginId) -> String {
    format!("ai-{}:user", login)
}

/// Recover `(kind, identifier)` from any network user id produced above.
///
/// Returns `None` for ids that do not follow the `ai-{login}:...` shape
/// (e.g. ids belonging to other bridges or plain human accounts).
pub fn parse_ghost_id(id: &str) -> Option<ParsedIdentity> {
    let rest = id.strip_prefix("ai-")?;
    let (login, tail) = rest.split_once(':')?;
    if tail == "user" {
        return Some(ParsedIdentity::Human {
            login: login.to_string(),
        });
    }
    if let Some(model_slug) = tail.strip_prefix("model:") {
        return Some(ParsedIdentity::Model {
            login: login.to_string(),
            model_slug: model_slug.to_string(),
        });
    }
    if let Some(rest) = tail.strip_prefix("agent-model:") {
        let (agent_id, model_slug) = rest.split_once(':')?;
        return Some(ParsedIdentity::AgentModel {
            login: login.to_string(),
            agent_id: agent_id.to_string(),
            model_slug: model_slug.to_string(),
        });
    }
    if let Some(agent_id) = tail.strip_prefix("agent:") {
        return Some(ParsedIdentity::Agent {
            login: login.to_string(),
            agent_id: agent_id.to_string(),
        });
    }
    None
}

/// Returns the agent id when `id` is an agent or agent+model ghost, else "".
pub fn parse_agent_from_ghost_id(id: &str) -> String {
    match parse_ghost_id(id) {
        Some(ParsedIdentity::Agent { agent_id, .. }) => agent_id,
        Some(ParsedIdentity::AgentModel { agent_id, .. }) => agent_id,
        _ => String::new(),
    }
}

/// Reconstruct the canonical ghost id for a parsed identity — used by the
/// round-trip property (I10).
pub fn reconstruct(parsed: &ParsedIdentity) -> String {
    match parsed {
        ParsedIdentity::Model { login, model_slug } => {
            format!("ai-{login}:model:{model_slug}")
        }
        ParsedIdentity::Agent { login, agent_id } => {
            format!("ai-{login}:agent:{agent_id}")
        }
        ParsedIdentity::AgentModel {
            login,
            agent_id,
            model_slug,
        } => format!("ai-{login}:agent-model:{agent_id}:{model_slug}"),
        ParsedIdentity::Human { login } => format!("ai-{login}:user"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login() -> LoginId {
        LoginId::from("acct1")
    }

    #[test]
    fn roundtrip_model_ghost() {
        let id = model_ghost_id(&login(), "openai/gpt-4o");
        let parsed = parse_ghost_id(&id).expect("parses");
        assert_eq!(reconstruct(&parsed), id);
    }

    #[test]
    fn roundtrip_agent_ghost() {
        let id = agent_ghost_id(&login(), "beep");
        let parsed = parse_ghost_id(&id).expect("parses");
        assert_eq!(reconstruct(&parsed), id);
        assert_eq!(parse_agent_from_ghost_id(&id), "beep");
    }

    #[test]
    fn roundtrip_agent_model_ghost() {
        let id = agent_model_ghost_id(&login(), "beep", "gpt-4o");
        let parsed = parse_ghost_id(&id).expect("parses");
        assert_eq!(reconstruct(&parsed), id);
        assert_eq!(parse_agent_from_ghost_id(&id), "beep");
    }

    #[test]
    fn roundtrip_human() {
        let id = human_user_id(&login());
        let parsed = parse_ghost_id(&id).expect("parses");
        assert_eq!(reconstruct(&parsed), id);
    }

    #[test]
    fn non_ghost_id_parses_to_none() {
        assert_eq!(parse_ghost_id("@someone:example.org"), None);
        assert_eq!(parse_agent_from_ghost_id("@someone:example.org"), "");
    }

    #[test]
    fn slug_lowercases_and_replaces_separators() {
        assert_eq!(slug("OpenAI/GPT-4o"), "openai-gpt-4o");
    }
}
