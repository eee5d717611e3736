//! Courier Runtime - orchestration layer for the Courier bot dispatcher.
//!
//! This crate provides:
//! - Configuration loading and validation (`config`)
//! - Logging setup (`logging`)
//! - The long-poll loop (`Poller`)
//! - Runtime orchestration with graceful shutdown (`CourierRuntime`)
//!
//! ```ignore
//! use courier_runtime::CourierRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     CourierRuntime::new()
//!         .command("start", start)
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! With the `http-client` feature the runtime builds a Telegram client from
//! `bot.token`; without it, call `with_transport` with your own `Bot` and
//! `UpdateSource`.

pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, CourierConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use poller::{PollOutcome, Poller};
pub use runtime::{CourierRuntime, RuntimeBuilder, wait_for_shutdown};

pub use tokio_util::sync::CancellationToken;
pub use tracing;
pub use tracing_subscriber;

/// Commonly used logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
