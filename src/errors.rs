//! Application error model with envelope mapping
//!
//! Defines a typed error hierarchy using `thiserror`. Every variant is
//! recoverable at the process level: the dispatcher converts it into an error
//! envelope whose content is `"Error: "` followed by the `Display` text.

use thiserror::Error;

/// Application error type
///
/// Covers argument validation, AppleScript failures reported by the scripting
/// bridge, and local failures around spawning or serializing.
#[derive(Debug, Error)]
pub enum AppError {
    /// Caller-supplied arguments missing or malformed
    #[error("{0}")]
    InvalidParameter(String),
    /// Mail rejected or failed the script (object not found, app not running)
    #[error("AppleScript error ({code}): {message}")]
    ScriptExecutionFailed {
        /// Human-readable message reported by the scripting bridge
        message: String,
        /// Numeric AppleScript error number
        code: i64,
    },
    /// Script text could not be compiled by the scripting bridge
    #[error("Failed to create AppleScript: {0}")]
    ScriptCreationFailed(String),
    /// Internal error (bridge unavailable, task failure, serialization)
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Convenience constructor for `InvalidParameter`
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Convenience constructor for `ScriptExecutionFailed`
    pub fn script(message: impl Into<String>, code: i64) -> Self {
        Self::ScriptExecutionFailed {
            message: message.into(),
            code,
        }
    }
}

/// Type alias for fallible return values
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn script_failure_pairs_code_with_message() {
        let err = AppError::script("object not found", 17);
        assert_eq!(err.to_string(), "AppleScript error (17): object not found");
    }

    #[test]
    fn invalid_parameter_displays_message_verbatim() {
        let err = AppError::invalid("Unknown tool: nope");
        assert_eq!(err.to_string(), "Unknown tool: nope");
    }
}
