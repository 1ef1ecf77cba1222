use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Event-stream connection or initial subscription failed
    #[error("Adapter connect error: {0}")]
    AdapterConnect(String),

    /// A notify or remediate action failed
    #[error("Dispatch error ({action}): {message}")]
    Dispatch { action: String, message: String },

    /// Statistics rendering exceeded its buffer
    #[error("Statistics exceeded {capacity} bytes")]
    RenderOverflow { capacity: usize },

    /// Event-stream transport failure after startup
    #[error("Transport error: {0}")]
    Transport(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build a dispatch error for the named action
    pub fn dispatch(action: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Dispatch {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::AdapterConnect(_) => "ADAPTER_CONNECT_ERROR",
            AppError::Dispatch { .. } => "DISPATCH_ERROR",
            AppError::RenderOverflow { .. } => "RENDER_OVERFLOW",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
