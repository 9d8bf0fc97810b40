//! Custom error types for the bridge
//!
//! Launch and script-file failures are errors. Timeouts, cancellations and
//! scripts that exit non-zero are not: they come back as a `RunResult` and
//! are classified by `RunFailure`.

use thiserror::Error;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The runtime binary could not be located or spawned
    #[error("Failed to launch '{binary}': {reason}")]
    Launch { binary: String, reason: String },

    /// The temporary script could not be written or removed
    #[error("Script file error: {0}")]
    ScriptIo(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied a value the bridge refuses to embed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Create a launch error
    pub fn launch(binary: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Launch {
            binary: binary.into(),
            reason: reason.into(),
        }
    }

    /// Create a script file error
    pub fn script_io(msg: impl Into<String>) -> Self {
        Self::ScriptIo(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_message_names_binary() {
        let err = BridgeError::launch("/opt/python3", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Failed to launch '/opt/python3': No such file or directory"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: BridgeError = io.into();
        assert!(matches!(err, BridgeError::Io(_)));
    }
}
