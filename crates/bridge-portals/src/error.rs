use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("portal not found: {key}")]
    NotFound { key: String },

    #[error("login not found: {id}")]
    LoginNotFound { id: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("agent error: {0}")]
    Agent(#[from] bridge_agents::error::AgentError),

    #[error("invalid portal key: {0}")]
    InvalidKey(String),

    #[error("chat network error: {0}")]
    ChatNetwork(String),
}

pub type Result<T> = std::result::Result<T, PortalError>;
