//! Update dispatcher.
//!
//! The [`Dispatcher`] routes each decoded update to exactly one unit of work:
//!
//! 1. Updates without a payload are dropped.
//! 2. If the update's `(chat, user)` pair is captured by a conversation, the
//!    conversation gets it, and routing stops there.
//! 3. A message starting with `/` goes to the handler for its command token;
//!    other non-empty text goes to the text handler.
//! 4. A callback query goes to the callback handler.
//!
//! Missing handlers are routing misses, not errors. The chosen unit is
//! submitted to the [`DispatchPool`] and the dispatcher returns without
//! waiting for it to finish.

use std::sync::Arc;

use tracing::{Level, Span, debug, span};

use courier_core::{BoxedBot, ConversationKey, Payload, Update};

use crate::command::command_token;
use crate::context::Context;
use crate::conversations::ConversationRegistry;
use crate::handler::BoxedHandler;
use crate::pool::{DispatchPool, Submission};
use crate::registry::HandlerRegistry;

/// Where an update was routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Sent to the conversation capturing this key.
    Conversation(ConversationKey),
    /// Sent to the handler registered for this command token.
    Command(String),
    /// Sent to the generic text handler.
    Text,
    /// Sent to the callback handler.
    Callback,
    /// Not dispatched.
    Dropped(DropReason),
}

/// Why an update was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The update carries no supported payload.
    NoPayload,
    /// A message without text, outside any conversation.
    EmptyText,
    /// No handler is registered for the command token.
    UnknownCommand,
    NoTextHandler,
    NoCallbackHandler,
    /// The dispatch pool was full and rejected the unit.
    Saturated,
    /// The dispatch pool is shutting down.
    ShuttingDown,
}

/// The routing brain of the poll loop.
///
/// # Thread Safety
///
/// `Dispatcher` is `Send + Sync`; the handler table is immutable once the
/// dispatcher is built.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<HandlerRegistry>,
    conversations: ConversationRegistry,
    bot: BoxedBot,
    pool: DispatchPool,
}

impl Dispatcher {
    /// Creates a dispatcher, freezing the handler registry.
    pub fn new(
        handlers: HandlerRegistry,
        conversations: ConversationRegistry,
        bot: BoxedBot,
        pool: DispatchPool,
    ) -> Self {
        Self {
            handlers: Arc::new(handlers),
            conversations,
            bot,
            pool,
        }
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn conversations(&self) -> &ConversationRegistry {
        &self.conversations
    }

    pub fn pool(&self) -> &DispatchPool {
        &self.pool
    }

    /// Routes one update and submits its unit of work.
    ///
    /// Under [`Saturation::Wait`](crate::pool::Saturation::Wait) this waits
    /// for a free slot; it never waits for the unit itself.
    pub async fn dispatch(&self, update: Update) -> Route {
        let Some(key) = update.key() else {
            debug!(update_id = update.update_id, "Dropping update without payload");
            return Route::Dropped(DropReason::NoPayload);
        };

        if let Some(entry) = self.conversations.lookup(&key) {
            let span = span!(
                Level::DEBUG,
                "conversation",
                update_id = update.update_id,
                key = %key,
                generation = entry.generation(),
            );
            // The limit applies to `advance` alone, not to the wait for the
            // entry lock.
            let registry = self.conversations.clone();
            let limit = self.pool.config().unit_timeout;
            let submitted = self
                .pool
                .submit_with_timeout(span, None, async move {
                    registry.dispatch_within(&entry, &update, limit).await;
                    Ok(())
                })
                .await;
            return Self::routed(submitted, Route::Conversation(key));
        }

        match &update.payload {
            Some(Payload::Message(message)) if message.text.is_empty() => {
                debug!(update_id = update.update_id, "Dropping message without text");
                Route::Dropped(DropReason::EmptyText)
            }
            Some(Payload::Message(message)) => match command_token(&message.text) {
                Some(token) => {
                    let token = token.to_string();
                    let Some(handler) = self.handlers.find_command(&token).cloned() else {
                        debug!(update_id = update.update_id, command = %token, "Unknown command");
                        return Route::Dropped(DropReason::UnknownCommand);
                    };
                    let span = span!(Level::DEBUG, "command", update_id = update.update_id, command = %token);
                    self.run(handler, update, span, Route::Command(token)).await
                }
                None => {
                    let Some(handler) = self.handlers.text_handler().cloned() else {
                        debug!(update_id = update.update_id, "No text handler registered");
                        return Route::Dropped(DropReason::NoTextHandler);
                    };
                    let span = span!(Level::DEBUG, "text", update_id = update.update_id);
                    self.run(handler, update, span, Route::Text).await
                }
            },
            Some(Payload::CallbackQuery(_)) => {
                let Some(handler) = self.handlers.callback_handler().cloned() else {
                    debug!(update_id = update.update_id, "No callback handler registered");
                    return Route::Dropped(DropReason::NoCallbackHandler);
                };
                let span = span!(Level::DEBUG, "callback", update_id = update.update_id);
                self.run(handler, update, span, Route::Callback).await
            }
            None => Route::Dropped(DropReason::NoPayload),
        }
    }

    async fn run(&self, handler: BoxedHandler, update: Update, span: Span, route: Route) -> Route {
        let ctx = Arc::new(Context::new(
            Arc::new(update),
            Arc::clone(&self.bot),
            self.conversations.clone(),
        ));
        let submitted = self.pool.submit(span, handler.call(ctx)).await;
        Self::routed(submitted, route)
    }

    fn routed(submitted: Submission, route: Route) -> Route {
        match submitted {
            Submission::Spawned => route,
            Submission::Rejected => Route::Dropped(DropReason::Saturated),
            Submission::Closed => Route::Dropped(DropReason::ShuttingDown),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers)
            .field("conversations", &self.conversations)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
