//! Handler registry.
//!
//! Maps command tokens to handlers and holds at most one generic text handler
//! and one callback handler. The registry is built before polling starts and
//! is read-only afterwards; the [`Dispatcher`](crate::Dispatcher) keeps it
//! behind an `Arc`.
//!
//! ```rust,ignore
//! let handlers = HandlerRegistry::new()
//!     .command("start", start)
//!     .command("/menu", menu)
//!     .text(echo)
//!     .callback(on_button);
//! ```

use std::collections::HashMap;

use tracing::warn;

use crate::command::COMMAND_SIGIL;
use crate::handler::{BoxedHandler, Handler, into_handler};

/// Static routing table for non-conversation updates.
#[derive(Default)]
pub struct HandlerRegistry {
    commands: HashMap<String, BoxedHandler>,
    text: Option<BoxedHandler>,
    callback: Option<BoxedHandler>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command handler (builder pattern).
    ///
    /// The leading `/` is optional: `"start"` and `"/start"` are the same token.
    pub fn command<H, T>(mut self, token: &str, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.add_command(token, into_handler(handler));
        self
    }

    /// Registers the generic text handler (builder pattern).
    pub fn text<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.set_text(into_handler(handler));
        self
    }

    /// Registers the callback handler (builder pattern).
    pub fn callback<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.set_callback(into_handler(handler));
        self
    }

    /// Registers a boxed command handler. A previous handler for the same
    /// token is replaced and returned.
    pub fn add_command(&mut self, token: &str, handler: BoxedHandler) -> Option<BoxedHandler> {
        let token = normalize_token(token);
        let previous = self.commands.insert(token.clone(), handler);
        if previous.is_some() {
            warn!(command = %token, "Command handler replaced");
        }
        previous
    }

    /// Sets the generic text handler, returning the previous one.
    pub fn set_text(&mut self, handler: BoxedHandler) -> Option<BoxedHandler> {
        let previous = self.text.replace(handler);
        if previous.is_some() {
            warn!("Text handler replaced");
        }
        previous
    }

    /// Sets the callback handler, returning the previous one.
    pub fn set_callback(&mut self, handler: BoxedHandler) -> Option<BoxedHandler> {
        let previous = self.callback.replace(handler);
        if previous.is_some() {
            warn!("Callback handler replaced");
        }
        previous
    }

    /// Looks up the handler for a command token (sigil included).
    pub fn find_command(&self, token: &str) -> Option<&BoxedHandler> {
        self.commands.get(token)
    }

    pub fn text_handler(&self) -> Option<&BoxedHandler> {
        self.text.as_ref()
    }

    pub fn callback_handler(&self) -> Option<&BoxedHandler> {
        self.callback.as_ref()
    }

    /// Registered command tokens, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.text.is_none() && self.callback.is_none()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("commands", &self.commands())
            .field("text", &self.text.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

fn normalize_token(token: &str) -> String {
    let token = token.trim();
    if token.starts_with(COMMAND_SIGIL) {
        token.to_string()
    } else {
        format!("{COMMAND_SIGIL}{token}")
    }
}
