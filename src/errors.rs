//! Error handling for the kiosk session core

/// Result type alias for the kiosk session core
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the kiosk session core
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A backend request was rejected or could not be delivered
    #[error("Backend error during {operation}: {message}")]
    Backend { operation: String, message: String },

    /// Session lifecycle errors (operation not valid in the current state)
    #[error("Session error: {message}")]
    Session { message: String },

    /// Storage collaborator errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Validation errors
    #[error("Validation failed: {field}")]
    Validation { field: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A combination of inputs that must never occur
    #[error("Internal invariant violated: {message}")]
    InvariantViolation { message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new backend error for the named operation
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a new session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new invariant violation
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Invariant violations cannot be recovered from by restarting the flow.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}

/// Convenience macros for creating specific error types
#[macro_export]
macro_rules! backend_error {
    ($op:expr, $msg:expr) => {
        $crate::Error::backend($op, $msg)
    };
    ($op:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::Error::backend($op, format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! session_error {
    ($msg:expr) => {
        $crate::Error::session($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::session(format!($fmt, $($arg)*))
    };
}
