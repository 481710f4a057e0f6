use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatNetworkError {
    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, ChatNetworkError>;
