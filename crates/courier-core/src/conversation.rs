//! The generic multi-step conversation contract.
//!
//! A conversation captures one `(chat, user)` pair: once registered, every
//! update for that pair is routed to [`Conversation::advance`] instead of the
//! command, text and callback handlers, until [`Conversation::is_closed`]
//! reports `true`.
//!
//! Concrete conversations typically keep a step indicator and dispatch on it:
//!
//! ```rust,ignore
//! enum Step { AskName, AskCity }
//!
//! struct Signup { key: ConversationKey, bot: BoxedBot, step: Step, closed: bool }
//!
//! #[async_trait]
//! impl Conversation for Signup {
//!     fn key(&self) -> ConversationKey { self.key }
//!
//!     async fn advance(&mut self, update: &Update) {
//!         match self.step {
//!             Step::AskName => { /* ... */ self.step = Step::AskCity; }
//!             Step::AskCity => { /* ... */ self.closed = true; }
//!         }
//!     }
//!
//!     fn is_closed(&self) -> bool { self.closed }
//! }
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::update::Update;

/// Identity of a captured conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey {
    pub chat_id: i64,
    pub user_id: i64,
}

impl ConversationKey {
    pub fn new(chat_id: i64, user_id: i64) -> Self {
        Self { chat_id, user_id }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.user_id)
    }
}

/// A stateful flow that intercepts all updates for its key until it closes.
///
/// The registry guarantees that `advance` is never called concurrently on the
/// same instance, so implementations need no internal locking.
#[async_trait]
pub trait Conversation: Send + 'static {
    /// The `(chat, user)` pair this conversation captures.
    fn key(&self) -> ConversationKey;

    /// Handles the next update for this conversation's key.
    async fn advance(&mut self, update: &Update);

    /// Returns `true` once the conversation is finished.
    fn is_closed(&self) -> bool;

    /// Name used in log output.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// An owned Conversation trait object.
pub type BoxedConversation = Box<dyn Conversation>;
