//! # Courier Transport
//!
//! Network implementations of the `courier-core` collaborator traits.
//!
//! ## Features
//!
//! - `http-client`: [`TelegramClient`], a Telegram Bot API client that is
//!   both the [`UpdateSource`](courier_core::UpdateSource) (`getUpdates`) and
//!   the [`Bot`](courier_core::Bot) (`sendMessage`, `editMessageText`,
//!   `answerCallbackQuery`).
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use courier_transport::TelegramClient;
//!
//! let client = Arc::new(
//!     TelegramClient::builder(token)
//!         .request_timeout(Duration::from_secs(40))
//!         .build()?,
//! );
//! let bot: BoxedBot = client.clone();
//! let source: BoxedSource = client;
//! ```

#[cfg(feature = "http-client")]
pub mod telegram;

#[cfg(feature = "http-client")]
pub use telegram::{TelegramClient, TelegramClientBuilder};
