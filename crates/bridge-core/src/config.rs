use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

pub const DEFAULT_PORT: u16 = 8990;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// History window default (§4.7.1) when a portal has not overridden it.
pub const DEFAULT_MAX_CONTEXT_MESSAGES: u32 = 20;
/// TTL for `UserLogin.model_cache` (§3).
pub const MODEL_CACHE_TTL_SECS: i64 = 6 * 60 * 60;

/// Top-level config (`bridge.toml` + `BRIDGE_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub compaction: CompactionConfig,
    #[serde(default)]
    pub pruning: PruningConfig,
    #[serde(default)]
    pub login: LoginConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl BridgeConfig {
    /// Load from `bridge.toml` in the current directory, overridden by any
    /// `BRIDGE_*` environment variable (e.g. `BRIDGE_GATEWAY.PORT=9001`).
    pub fn load() -> Result<Self> {
        Figment::from(figment::providers::Serialized::defaults(
            BridgeConfig::default(),
        ))
        .merge(Toml::file("bridge.toml"))
        .merge(Env::prefixed("BRIDGE_").split("__"))
        .extract()
        .map_err(|e| BridgeError::Config(e.to_string()))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            turn: TurnConfig::default(),
            compaction: CompactionConfig::default(),
            pruning: PruningConfig::default(),
            login: LoginConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            auth: AuthConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// How the gateway's inbound endpoints (webhook ingress, settings writes)
/// authenticate a caller.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    None,
    Token,
}

/// The one login this bridge process bootstraps on startup (§4.9). A
/// production deployment would manage many logins; this bridge, like its
/// teacher, is single-tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    #[serde(default = "default_login_id")]
    pub id: String,
    #[serde(default = "default_login_provider")]
    pub provider: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            id: default_login_id(),
            provider: default_login_provider(),
        }
    }
}

fn default_login_id() -> String {
    "default".to_string()
}
fn default_login_provider() -> String {
    "openai".to_string()
}

/// Credentials and endpoints for the providers §4.7/§7 can route to. Every
/// field is optional — an unconfigured provider is simply never registered
/// with the `ProviderRouter`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub openai: Option<OpenAiProviderConfig>,
    pub openrouter: Option<OpenAiProviderConfig>,
    pub beeper: Option<OpenAiProviderConfig>,
    pub magic_proxy: Option<OpenAiProviderConfig>,
    pub codex: Option<CodexProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodexProviderConfig {
    #[serde(default = "default_codex_command")]
    pub command: String,
}

fn default_codex_command() -> String {
    "codex".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "bridge.sqlite3".to_string()
}

/// §6 "Auxiliary configuration options recognized by the core".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "bool_true")]
    pub enable_streaming: bool,
    #[serde(default = "default_transient_debounce_ms")]
    pub transient_debounce_ms: i64,
    #[serde(default = "default_max_urls_outbound")]
    pub max_urls_outbound: usize,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_cache_duration_secs")]
    pub cache_duration_secs: i64,
    #[serde(default = "default_title_generation_model")]
    pub title_generation_model: String,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            enable_streaming: true,
            transient_debounce_ms: default_transient_debounce_ms(),
            max_urls_outbound: default_max_urls_outbound(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_retry_attempts: default_max_retry_attempts(),
            cache_duration_secs: default_cache_duration_secs(),
            title_generation_model: default_title_generation_model(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    60_000
}
fn bool_true() -> bool {
    true
}
fn default_transient_debounce_ms() -> i64 {
    0
}
fn default_max_urls_outbound() -> usize {
    3
}
fn default_fetch_timeout_ms() -> u64 {
    5_000
}
fn default_max_retry_attempts() -> u32 {
    3
}
fn default_cache_duration_secs() -> i64 {
    MODEL_CACHE_TTL_SECS
}
fn default_title_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_summarization_model")]
    pub summarization_model: String,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            summarization_model: default_summarization_model(),
        }
    }
}

fn default_summarization_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruningConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
