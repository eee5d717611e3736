//! # Courier Framework
//!
//! The dispatch engine of Courier.
//!
//! ```text
//!                 ┌──────────────────────┐  captured   ┌───────────────────┐
//! Update ───────▶ │      Dispatcher      │ ──────────▶ │ ConversationEntry │
//!                 │                      │             └───────────────────┘
//!                 │ command / text / cb  │ ──────────▶ handler (async fn)
//!                 └──────────────────────┘
//!                            │ every unit
//!                            ▼
//!                      DispatchPool (bounded, panic-isolated)
//! ```
//!
//! - [`OffsetTracker`]: the long-poll cursor
//! - [`ConversationRegistry`]: captured `(chat, user)` pairs with per-entry
//!   locking and an identity-checked removal
//! - [`HandlerRegistry`]: command, text and callback handlers, frozen into
//!   the [`Dispatcher`]
//! - [`DispatchPool`]: bounded execution of routed units

pub mod command;
pub mod context;
pub mod conversations;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod offset;
pub mod pool;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::{COMMAND_SIGIL, CommandArgs, command_token};
pub use context::Context;
pub use conversations::{Advance, ConversationEntry, ConversationRegistry, Registration};
pub use dispatcher::{Dispatcher, DropReason, Route};
pub use error::{
    ConversationError, ConversationResult, ExtractError, ExtractResult, HandlerError,
    HandlerResult,
};
pub use extractor::FromContext;
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, HandlerOutput, into_handler};
pub use offset::OffsetTracker;
pub use pool::{DispatchPool, PoolConfig, Saturation, Submission};
pub use registry::HandlerRegistry;
