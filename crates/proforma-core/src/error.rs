//! Error types for proforma-tools.

use thiserror::Error;

/// How much of an error response body is kept for diagnostics.
const BODY_TRUNCATE_LEN: usize = 500;

/// Main error type for proforma operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller supplied invalid input or a response had an unexpected shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource does not exist (HTTP 404 where absence is an error)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Insufficient permissions (HTTP 403)
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// API returned a non-2xx status
    #[error("API error: {status} from {endpoint} - {message}")]
    Transport {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// HTTP request failed before a response was received
    #[error("HTTP error: {0}")]
    Http(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a transport error, truncating the response body for diagnostics.
    pub fn transport(endpoint: impl Into<String>, status: u16, body: &str) -> Self {
        let message = if body.len() > BODY_TRUNCATE_LEN {
            let mut end = BODY_TRUNCATE_LEN;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body[..end].to_string()
        } else {
            body.to_string()
        };
        Error::Transport {
            endpoint: endpoint.into(),
            status,
            message,
        }
    }
}

/// Result type alias for proforma operations.
pub type Result<T> = std::result::Result<T, Error>;
