//! Error types for sqlporter.

use std::time::Duration;

use thiserror::Error;

use crate::schema::ObjectKind;

/// The main error type for sqlporter operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// Reading the source or writing the sink failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The script ended inside a quoted literal, identifier or block comment.
    #[error("Split error at line {line}: {message}")]
    Split { line: usize, message: String },

    /// A parse capability could not extract an entity from the statement.
    #[error("no {kind} found in statement")]
    NotFound { kind: ObjectKind },

    /// Grammar failure inside a parse capability.
    #[error("Parse error in statement at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The operation deadline elapsed.
    #[error("batch processing timeout after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The batch processor was stopped.
    #[error("batch processor stopped")]
    Stopped,

    /// A handler panicked while processing an item.
    #[error("worker panicked: {0}")]
    WorkerPanic(String),

    /// The user callback aborted the stream.
    #[error("callback aborted: {0}")]
    Callback(String),

    /// Unsupported dialect name.
    #[error("Unknown dialect: '{0}'. Expected: mysql, postgres or sqlite")]
    UnknownDialect(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file is not valid TOML.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PortError {
    /// Create a split error at the given line.
    pub fn split(line: usize, message: impl Into<String>) -> Self {
        Self::Split {
            line,
            message: message.into(),
        }
    }

    /// Create a parse error for the statement starting at `line`.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create a "no <kind> found" error.
    pub fn not_found(kind: ObjectKind) -> Self {
        Self::NotFound { kind }
    }

    /// Create a callback error.
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback(message.into())
    }

    /// Attach a statement line to a parse error raised without one.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            Self::Parse { line: 0, message } => Self::Parse { line, message },
            other => other,
        }
    }

    /// True for the errors that end an operation early without a failure of
    /// the work itself.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled | Self::Stopped)
    }
}

/// Result type alias for sqlporter operations.
pub type Result<T> = std::result::Result<T, PortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::split(12, "unterminated string literal");
        assert_eq!(
            err.to_string(),
            "Split error at line 12: unterminated string literal"
        );
    }

    #[test]
    fn test_not_found_names_kind() {
        let err = PortError::not_found(ObjectKind::Trigger);
        assert_eq!(err.to_string(), "no trigger found in statement");
    }

    #[test]
    fn test_at_line_only_fills_missing_line() {
        let err = PortError::parse(0, "bad column").at_line(7);
        assert!(matches!(err, PortError::Parse { line: 7, .. }));

        let err = PortError::parse(3, "bad column").at_line(7);
        assert!(matches!(err, PortError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_interruptions_are_distinct() {
        assert!(PortError::Timeout(Duration::from_secs(1)).is_interruption());
        assert!(PortError::Cancelled.is_interruption());
        assert!(PortError::Stopped.is_interruption());
        assert!(!PortError::callback("no").is_interruption());
    }
}
