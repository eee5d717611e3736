//! # Courier Core
//!
//! Data model and collaborator traits for the Courier long-poll dispatcher.
//!
//! This crate has no runtime of its own. It defines what flows through the
//! dispatcher and the seams where the outside world plugs in:
//!
//! - **Updates**: the inbound event model ([`Update`], [`Payload`]) and the
//!   all-or-nothing batch decoder ([`decode_batch`])
//! - **Transport seams**: [`UpdateSource`] for long-poll fetches and [`Bot`]
//!   for outbound send/edit/acknowledge calls
//! - **Conversations**: the [`Conversation`] contract and its
//!   [`ConversationKey`] identity
//! - **Formatting**: inline keyboards and parse modes
//!
//! ```text
//! ┌──────────────┐ bytes ┌──────────────┐ Vec<Update> ┌────────────┐
//! │ UpdateSource │──────▶│ decode_batch │────────────▶│ Dispatcher │──▶ Bot
//! └──────────────┘       └──────────────┘             └────────────┘
//! ```

pub mod bot;
pub mod conversation;
pub mod error;
pub mod keyboard;
pub mod source;
pub mod update;

pub use bot::{Bot, BoxedBot};
pub use conversation::{BoxedConversation, Conversation, ConversationKey};
pub use error::{
    ApiError, ApiResult, DecodeError, DecodeResult, TransportError, TransportResult,
};
pub use keyboard::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
pub use source::{BoxedSource, PollParams, UpdateSource};
pub use update::{CallbackQueryEvent, MessageEvent, Payload, Update, UpdateBatch, decode_batch};
