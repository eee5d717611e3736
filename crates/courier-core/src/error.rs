//! Unified error types for the Courier core.
//!
//! Framework-level errors (extraction, handler and conversation failures) are
//! defined in `courier-framework`; configuration and runtime errors live in
//! `courier-runtime`.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised while talking to the remote messaging API.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection dropped.
    #[error("request to {method} failed: {reason}")]
    RequestFailed {
        /// The API method being called.
        method: String,
        /// Reason for failure.
        reason: String,
    },

    /// The request did not complete before the client timeout.
    #[error("request to {method} timed out")]
    Timeout {
        /// The API method being called.
        method: String,
    },

    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status} from {method}: {body}")]
    Status {
        /// The API method being called.
        method: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Invalid client configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// A fetched batch could not be turned into typed updates.
///
/// Decoding is all-or-nothing: when this error is returned no update of the
/// batch is applied and the offset must stay where it was.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON or does not match the envelope shape.
    #[error("malformed update batch: {0}")]
    Malformed(String),

    /// The envelope reported success but carried no `result` array.
    #[error("update batch is missing its result array")]
    MissingResult,
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for outbound API calls (send, edit, acknowledge).
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The API answered `ok: false`.
    #[error("API error ({code}): {description}")]
    Api {
        /// Error code reported by the server (`0` when absent).
        code: i64,
        /// Human-readable description reported by the server.
        description: String,
    },
    /// The response did not have the expected shape.
    #[error("unexpected API response: {0}")]
    UnexpectedResponse(String),
    /// Failed to serialize/deserialize.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
