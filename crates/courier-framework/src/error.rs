//! Error types for the Courier framework.

use thiserror::Error;

use courier_core::ConversationKey;

/// Errors that can occur during context extraction.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The update does not carry the payload the extractor needs.
    #[error("payload mismatch: expected '{expected}', got '{got}'")]
    PayloadMismatch {
        /// Expected payload kind.
        expected: &'static str,
        /// Actual payload kind.
        got: &'static str,
    },

    /// The message is not a command.
    #[error("message is not a command")]
    NotACommand,

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Failure of a single handler or conversation unit.
///
/// These never leave the dispatch pool; they are logged at the unit boundary.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// A handler parameter could not be extracted.
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// The handler returned an error.
    #[error("{0}")]
    Failed(String),
}

/// Result type returned by every dispatched unit.
pub type HandlerResult = Result<(), HandlerError>;

/// Errors returned by conversation registration.
#[derive(Debug, Clone, Error)]
pub enum ConversationError {
    /// A live conversation already captures this key.
    #[error("conversation {0} is already active")]
    Occupied(ConversationKey),

    /// The conversation reported closed before it was registered.
    #[error("conversation {0} is already closed")]
    Closed(ConversationKey),
}

/// Result type for conversation registration.
pub type ConversationResult<T> = Result<T, ConversationError>;
