//! Error types for rocketnotes.

use thiserror::Error;

/// Result type alias using rocketnotes' Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rocketnotes operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Submitted tree violates a structural rule
    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    /// Queue message body could not be parsed against its schema
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Queue operation failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// Object store operation failed
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether redelivering the same message could succeed.
    ///
    /// Schema, validation and configuration problems are a property of the
    /// message or the user's settings, so they go to the dead-letter queue.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::MalformedMessage(_)
                | Error::InvalidInput(_)
                | Error::InvalidTree(_)
                | Error::Config(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("tree u1".to_string());
        assert_eq!(err.to_string(), "Not found: tree u1");
    }

    #[test]
    fn test_error_display_invalid_tree() {
        let err = Error::InvalidTree("duplicate node d1".to_string());
        assert_eq!(err.to_string(), "Invalid tree: duplicate node d1");
    }

    #[test]
    fn test_error_display_malformed_message() {
        let err = Error::MalformedMessage("missing field `document`".to_string());
        assert_eq!(
            err.to_string(),
            "Malformed message: missing field `document`"
        );
    }

    #[test]
    fn test_error_display_queue() {
        let err = Error::Queue("receipt expired".to_string());
        assert_eq!(err.to_string(), "Queue error: receipt expired");
    }

    #[test]
    fn test_error_display_object_store() {
        let err = Error::ObjectStore("bucket missing".to_string());
        assert_eq!(err.to_string(), "Object store error: bucket missing");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(!Error::MalformedMessage("x".into()).is_retryable());
        assert!(!Error::InvalidInput("x".into()).is_retryable());
        assert!(!Error::Config("no key".into()).is_retryable());
        assert!(Error::Queue("down".into()).is_retryable());
        assert!(Error::Embedding("timeout".into()).is_retryable());
        assert!(Error::ObjectStore("io".into()).is_retryable());
    }

    #[test]
    fn test_error_is_debug() {
        let err = Error::Internal("boom".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("Internal"));
    }
}
