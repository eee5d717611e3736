//! Per-update context handed to handlers.

use std::sync::Arc;

use courier_core::{BoxedBot, CallbackQueryEvent, MessageEvent, Update};

use crate::conversations::ConversationRegistry;

/// Everything a handler can extract for one update.
///
/// One `Context` is created per routed update and shared through an `Arc`
/// with the handler's extractors.
pub struct Context {
    update: Arc<Update>,
    bot: BoxedBot,
    conversations: ConversationRegistry,
}

impl Context {
    /// Creates a new context.
    pub fn new(update: Arc<Update>, bot: BoxedBot, conversations: ConversationRegistry) -> Self {
        Self {
            update,
            bot,
            conversations,
        }
    }

    /// Returns the update being handled.
    pub fn update(&self) -> &Arc<Update> {
        &self.update
    }

    /// Returns the bot used to reply.
    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    /// Returns the conversation registry, for handlers that start conversations.
    pub fn conversations(&self) -> &ConversationRegistry {
        &self.conversations
    }

    /// Returns the message payload, if any.
    pub fn message(&self) -> Option<&MessageEvent> {
        self.update.as_message()
    }

    /// Returns the callback query payload, if any.
    pub fn callback_query(&self) -> Option<&CallbackQueryEvent> {
        self.update.as_callback_query()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("update", &self.update)
            .field("conversations", &self.conversations.len())
            .finish_non_exhaustive()
    }
}
