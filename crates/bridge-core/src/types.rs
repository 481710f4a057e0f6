//! The data model of §3: portals, logins, the message log, and model
//! capabilities. Kept free of any persistence or chat-network dependency so
//! every other crate can share these value types without a cyclic import.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a chat-network login (one per bridged account).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoginId(pub String);

impl LoginId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LoginId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque chat-network room identifier, once the room has been created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `portal_key = (portal_id, receiver_login_id)` — §3 "Portal / Identity".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortalKey {
    pub portal_id: String,
    pub receiver_login_id: LoginId,
}

impl PortalKey {
    pub fn new(portal_id: impl Into<String>, receiver_login_id: LoginId) -> Self {
        Self {
            portal_id: portal_id.into(),
            receiver_login_id,
        }
    }
}

impl fmt::Display for PortalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.receiver_login_id, self.portal_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
    Xhigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    #[default]
    Messages,
    Responses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TypingMode {
    #[default]
    Off,
    Never,
    Instant,
    Thinking,
    Message,
}

/// Named profile plus per-tool overrides — §3 "Portal.tool_policy".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPolicy {
    /// Named preset (e.g. "default", "readonly", "none").
    pub profile: String,
    /// `tool_name -> enabled`; overrides the profile for individual tools.
    #[serde(default)]
    pub overrides: std::collections::BTreeMap<String, bool>,
}

impl ToolPolicy {
    /// Whether `tool_name` may run under this policy (§4.7.3 tool-call handling).
    pub fn allows(&self, tool_name: &str) -> bool {
        if let Some(&enabled) = self.overrides.get(tool_name) {
            return enabled;
        }
        self.profile != "none"
    }
}

/// Cached capability snapshot — §3 "ModelCapabilities".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub supports_vision: bool,
    pub supports_reasoning: bool,
    pub supports_tool_calling: bool,
    pub supports_web_search: bool,
    pub supports_image_gen: bool,
    pub supports_audio: bool,
    pub context_window: u32,
}

/// Per-room metadata blob — §3 "Portal / Metadata fields".
///
/// All fields besides identity and flags explicitly called out as required
/// are optional; empty string / zero means "unset, inherit from a narrower
/// scope" as described by `CapabilityResolver::effective_*` (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalMetadata {
    pub model: String,
    pub slug: String,
    pub title: String,
    pub title_generated: bool,

    pub system_prompt: String,
    pub agent_id: String,
    pub default_agent_id: String,
    pub agent_prompt: String,

    pub reasoning_effort: Option<ReasoningEffort>,
    pub thinking_level: Option<String>,
    pub emit_thinking: bool,

    /// 0 means "unset / provider default" per §3.
    pub temperature: f32,
    /// 1..100, default 20 — see `bridge_core::config::DEFAULT_MAX_CONTEXT_MESSAGES`.
    pub max_context_messages: u32,
    /// 1..16384.
    pub max_completion_tokens: u32,

    pub capabilities: ModelCapabilities,

    pub conversation_mode: ConversationMode,
    pub last_response_id: String,

    pub welcome_sent: bool,
    pub is_builder_room: bool,
    pub is_raw_mode: bool,
    /// Unix ms; messages before this point are not reconsidered in prompts.
    pub session_reset_at: i64,

    pub typing_mode: TypingMode,
    pub typing_interval_seconds: u32,

    /// -1 = off, 0 = default, N = milliseconds.
    pub debounce_ms: i64,

    pub tool_policy: ToolPolicy,

    /// Unix seconds of the last time room-state was broadcast (§4.6).
    pub last_room_state_sync: i64,

    /// Ambient optimistic-concurrency counter; logging only (SPEC_FULL §3).
    #[serde(default)]
    pub row_version: u64,
}

impl Default for PortalMetadata {
    fn default() -> Self {
        Self {
            model: String::new(),
            slug: String::new(),
            title: String::new(),
            title_generated: false,
            system_prompt: String::new(),
            agent_id: String::new(),
            default_agent_id: String::new(),
            agent_prompt: String::new(),
            reasoning_effort: None,
            thinking_level: None,
            emit_thinking: false,
            temperature: 0.0,
            max_context_messages: crate::config::DEFAULT_MAX_CONTEXT_MESSAGES,
            max_completion_tokens: 4096,
            capabilities: ModelCapabilities::default(),
            conversation_mode: ConversationMode::default(),
            last_response_id: String::new(),
            welcome_sent: false,
            is_builder_room: false,
            is_raw_mode: false,
            session_reset_at: 0,
            typing_mode: TypingMode::default(),
            typing_interval_seconds: 5,
            debounce_ms: 0,
            tool_policy: ToolPolicy::default(),
            last_room_state_sync: 0,
            row_version: 0,
        }
    }
}

/// A bound pair of a chat-network room and a domain-level conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portal {
    pub key: PortalKey,
    pub room_id: Option<RoomId>,
    /// The single AI ghost resident in this room — invariant (1) of §3.
    pub other_user_id: String,
    pub metadata: PortalMetadata,
}

impl Portal {
    pub fn new(key: PortalKey) -> Self {
        Self {
            key,
            room_id: None,
            other_user_id: String::new(),
            metadata: PortalMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Openai,
    Openrouter,
    Beeper,
    MagicProxy,
    Custom,
    Codex,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginDefaults {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub reasoning_effort: Option<ReasoningEffort>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCacheEntry {
    pub models: Vec<String>,
    /// Unix seconds of the last refresh.
    pub last_refresh: i64,
    /// TTL in seconds (default `MODEL_CACHE_TTL_SECS`).
    pub cache_duration: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpTransport {
    StreamableHttp,
    Stdio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpKind {
    Nexus,
    Generic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub endpoint: String,
    pub transport: McpTransport,
    pub auth_type: String,
    pub token: String,
    pub kind: McpKind,
}

/// Per-login metadata — §3 "UserLogin metadata".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLogin {
    pub id: String,
    pub provider: Provider,
    pub api_key: String,
    pub base_url: String,
    pub codex_home: String,
    pub codex_auth_mode: String,

    pub defaults: LoginDefaults,
    pub model_cache: ModelCacheEntry,

    pub next_chat_index: u32,
    pub default_chat_portal_id: Option<String>,
    pub builder_room_id: Option<String>,
    pub chats_synced: bool,

    pub service_tokens: std::collections::BTreeMap<String, String>,
    pub mcp_servers: std::collections::BTreeMap<String, McpServerConfig>,

    pub title_generation_model: String,
    /// IANA timezone name.
    pub timezone: String,
    pub gravatar_primary: Option<String>,

    pub logged_in: bool,
}

impl UserLogin {
    pub fn new(id: impl Into<String>, provider: Provider) -> Self {
        Self {
            id: id.into(),
            provider,
            api_key: String::new(),
            base_url: String::new(),
            codex_home: String::new(),
            codex_auth_mode: String::new(),
            defaults: LoginDefaults::default(),
            model_cache: ModelCacheEntry::default(),
            next_chat_index: 0,
            default_chat_portal_id: None,
            builder_room_id: None,
            chats_synced: false,
            service_tokens: Default::default(),
            mcp_servers: Default::default(),
            title_generation_model: String::new(),
            timezone: "UTC".to_string(),
            gravatar_primary: None,
            logged_in: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: Option<String>,
    pub is_error: bool,
}

/// One row of the append-only message log — §3 "Message".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub role: MessageRole,
    pub body: String,
    pub completion_id: Option<String>,
    pub finish_reason: Option<String>,
    pub model: String,
    pub turn_id: String,
    pub agent_id: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub reasoning_tokens: u32,
    pub thinking_content: Option<String>,
    pub has_tool_calls: bool,
    pub exclude_from_history: bool,
    /// Unix ms timing marks: started, first token, completed.
    pub started_at: i64,
    pub first_token_at: i64,
    pub completed_at: i64,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            role: MessageRole::User,
            body: String::new(),
            completion_id: None,
            finish_reason: None,
            model: String::new(),
            turn_id: String::new(),
            agent_id: None,
            tool_calls: Vec::new(),
            prompt_tokens: 0,
            completion_tokens: 0,
            reasoning_tokens: 0,
            thinking_content: None,
            has_tool_calls: false,
            exclude_from_history: false,
            started_at: 0,
            first_token_at: 0,
            completed_at: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// UUIDv7 — time-sortable, matches the teacher's id convention.
    pub id: String,
    pub mxid: String,
    pub portal_key: PortalKey,
    pub sender_id: String,
    /// Unix ms.
    pub timestamp: i64,
    pub metadata: MessageMetadata,
}

impl Message {
    pub fn new(portal_key: PortalKey, sender_id: impl Into<String>, metadata: MessageMetadata) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            mxid: String::new(),
            portal_key,
            sender_id: sender_id.into(),
            timestamp: metadata.started_at,
            metadata,
        }
    }
}
