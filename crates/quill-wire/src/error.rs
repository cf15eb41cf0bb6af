//! Error types for quill-wire

use thiserror::Error;

/// Result type alias using quill-wire Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the answer service
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Service answered with a non-success status
    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Request was cancelled through its cancellation token
    #[error("Request aborted")]
    Aborted,

    /// Local I/O failed (e.g. reading a captured stream)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Byte stream failed mid-flight
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a status error from a status code and response body
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Whether this error only reports that the caller cancelled the request.
    ///
    /// Cancellation is not a failure: the pipeline returns to idle without
    /// writing an error onto the turn.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }

    /// Check if the service rejected the request as malformed
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Status { status, .. } if (400..500).contains(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_is_aborted() {
        assert!(Error::Aborted.is_aborted());
    }

    #[test]
    fn test_status_is_not_aborted() {
        assert!(!Error::status(500, "boom").is_aborted());
        assert!(!Error::Transport("reset".into()).is_aborted());
    }

    #[test]
    fn test_client_error_range() {
        assert!(Error::status(404, "missing").is_client_error());
        assert!(!Error::status(502, "bad gateway").is_client_error());
        assert!(!Error::Aborted.is_client_error());
    }

    #[test]
    fn test_status_display() {
        let e = Error::status(503, "overloaded");
        assert_eq!(e.to_string(), "Service returned 503: overloaded");
    }
}
