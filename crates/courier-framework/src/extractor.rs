//! Extractor system for handler parameters.
//!
//! Any type implementing [`FromContext`] can be used as a handler parameter,
//! and the framework extracts it from the current [`Context`] before the
//! handler runs. If an extractor fails the handler is not called and the unit
//! ends with [`HandlerError::Extract`](crate::error::HandlerError::Extract).
//! [`Option<T>`] extractors never fail.

use std::sync::Arc;

use courier_core::{BoxedBot, CallbackQueryEvent, MessageEvent, Update};

use crate::command::CommandArgs;
use crate::context::Context;
use crate::conversations::ConversationRegistry;
use crate::error::{ExtractError, ExtractResult};

/// A trait for types that can be extracted from a [`Context`].
pub trait FromContext: Sized {
    /// Attempts to extract this type from the given context.
    fn from_context(ctx: &Context) -> ExtractResult<Self>;
}

impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &Context) -> ExtractResult<Self> {
        Ok(T::from_context(ctx).ok())
    }
}

impl FromContext for Arc<Update> {
    fn from_context(ctx: &Context) -> ExtractResult<Self> {
        Ok(Arc::clone(ctx.update()))
    }
}

impl FromContext for MessageEvent {
    fn from_context(ctx: &Context) -> ExtractResult<Self> {
        ctx.message()
            .cloned()
            .ok_or_else(|| ExtractError::PayloadMismatch {
                expected: "message",
                got: ctx.update().kind(),
            })
    }
}

impl FromContext for CallbackQueryEvent {
    fn from_context(ctx: &Context) -> ExtractResult<Self> {
        ctx.callback_query()
            .cloned()
            .ok_or_else(|| ExtractError::PayloadMismatch {
                expected: "callback_query",
                got: ctx.update().kind(),
            })
    }
}

/// Injects the bot so handlers can reply:
///
/// ```rust,ignore
/// async fn start(bot: BoxedBot, msg: MessageEvent) {
///     bot.send_message(msg.chat_id, "Hello!", None, None).await.ok();
/// }
/// ```
impl FromContext for BoxedBot {
    fn from_context(ctx: &Context) -> ExtractResult<Self> {
        Ok(Arc::clone(ctx.bot()))
    }
}

impl FromContext for ConversationRegistry {
    fn from_context(ctx: &Context) -> ExtractResult<Self> {
        Ok(ctx.conversations().clone())
    }
}

impl FromContext for CommandArgs {
    fn from_context(ctx: &Context) -> ExtractResult<Self> {
        let msg = MessageEvent::from_context(ctx)?;
        CommandArgs::parse(&msg.text).ok_or(ExtractError::NotACommand)
    }
}
