//! Error types for messaging operations

use crate::error::AppError;

/// Result type for messaging operations
pub type MessagingResult<T> = std::result::Result<T, MessagingError>;

/// Errors that can occur during messaging operations
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Subscribe failed
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Unsubscribe failed
    #[error("Unsubscribe failed: {0}")]
    UnsubscribeFailed(String),

    /// Operation needs a connection that is not established
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl From<MessagingError> for AppError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::ConnectionFailed(_)
            | MessagingError::SubscribeFailed(_)
            | MessagingError::Timeout(_) => AppError::AdapterConnect(err.to_string()),
            _ => AppError::Transport(err.to_string()),
        }
    }
}
