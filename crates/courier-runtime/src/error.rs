//! Runtime error types.

use thiserror::Error;

use courier_core::TransportError;

use crate::config::ConfigError;

/// Errors that can occur while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP transport could not be built.
    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),

    /// No bot token was configured and no transport was supplied.
    #[error("Bot token is not configured (set TELEGRAM_BOT_TOKEN or bot.token)")]
    MissingToken,

    /// The `http-client` feature is disabled and no transport was supplied.
    #[error("No transport available: enable the `http-client` feature or call `with_transport`")]
    NoTransport,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
