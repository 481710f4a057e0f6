use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent not found: {0}")]
    NotFound(String),

    #[error("reserved agent id: {0}")]
    ReservedId(String),

    #[error("invalid agent id {0:?}: must match [a-z0-9-]+")]
    InvalidId(String),

    #[error("cannot modify a built-in preset: {0}")]
    ImmutablePreset(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
