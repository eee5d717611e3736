//! # Courier
//!
//! A long-poll chat bot dispatcher with per-user conversations.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐  getUpdates  ┌────────┐  Update  ┌────────────┐  unit  ┌──────────────┐
//! │ Source │ ───────────▶ │ Poller │ ───────▶ │ Dispatcher │ ─────▶ │ DispatchPool │
//! └────────┘              └────────┘          └────────────┘        └──────────────┘
//!                          (offsets)           conversations first,
//!                                              then command / text / callback
//! ```
//!
//! - **Runtime**: configuration, logging, transport and shutdown
//! - **Poller**: fetch, decode, dedup by `update_id`, dispatch in order
//! - **Conversations**: multi-step flows that capture one `(chat, user)` pair
//! - **Handlers**: async functions with extracted parameters (Axum-style)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! async fn start(bot: BoxedBot, msg: MessageEvent) -> ApiResult<()> {
//!     bot.send_message(msg.chat_id, "Hello!", None, None).await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RuntimeError> {
//!     CourierRuntime::new().command("start", start).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `http-client` *(default)*: Telegram Bot API client
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;
pub use courier_transport as transport;

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use courier_runtime::{CourierRuntime, RuntimeError, RuntimeResult};

    // Data model
    pub use courier_core::{
        CallbackQueryEvent, ConversationKey, MessageEvent, Payload, Update,
    };

    // Outbound API
    pub use courier_core::{
        ApiError, ApiResult, Bot, BoxedBot, InlineKeyboardButton, InlineKeyboardMarkup,
        ParseMode,
    };

    // Conversations
    pub use courier_core::Conversation;
    pub use courier_framework::{ConversationRegistry, Registration};

    // Handlers and extractors
    pub use courier_framework::{CommandArgs, FromContext, HandlerRegistry};
}
