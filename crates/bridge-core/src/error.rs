use thiserror::Error;

/// Shared error type for the storage and identity layers.
///
/// Crates that need richer categorization (provider failures, turn-engine
/// sentinels) define their own error enum and convert into or wrap this one
/// rather than growing it further.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Short stable code surfaced in bridge-notice error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "CONFIG_ERROR",
            BridgeError::Database(_) => "DATABASE_ERROR",
            BridgeError::NotFound(_) => "NOT_FOUND",
            BridgeError::InvalidArgument(_) => "INVALID_ARGUMENT",
            BridgeError::Serialization(_) => "SERIALIZATION_ERROR",
            BridgeError::Io(_) => "IO_ERROR",
            BridgeError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
