//! Inline keyboards and text formatting options for outbound messages.

use serde::{Deserialize, Serialize};

/// A single button of an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    /// Label shown on the button.
    pub text: String,
    /// Data delivered back in the callback query when pressed.
    pub callback_data: String,
}

impl InlineKeyboardButton {
    /// Creates a button that produces a callback query with `data`.
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: data.into(),
        }
    }
}

/// An inline keyboard attached to a message.
///
/// ```rust,ignore
/// let keyboard = InlineKeyboardMarkup::new()
///     .row([InlineKeyboardButton::callback("Option 1", "opt_1")])
///     .row([InlineKeyboardButton::callback("Option 2", "opt_2")]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// Creates an empty keyboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row of buttons.
    pub fn row(mut self, buttons: impl IntoIterator<Item = InlineKeyboardButton>) -> Self {
        self.inline_keyboard.push(buttons.into_iter().collect());
        self
    }

    /// Returns `true` if the keyboard has no buttons.
    pub fn is_empty(&self) -> bool {
        self.inline_keyboard.iter().all(Vec::is_empty)
    }
}

/// How the server should interpret markup in message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
    MarkdownV2,
}

impl ParseMode {
    /// Returns the wire value of this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::MarkdownV2 => "MarkdownV2",
        }
    }
}

impl std::fmt::Display for ParseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_serializes_to_bot_api_shape() {
        let keyboard = InlineKeyboardMarkup::new()
            .row([InlineKeyboardButton::callback("Option 1", "opt_1")])
            .row([InlineKeyboardButton::callback("Option 2", "opt_2")]);

        let value = serde_json::to_value(&keyboard).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "inline_keyboard": [
                    [{"text": "Option 1", "callback_data": "opt_1"}],
                    [{"text": "Option 2", "callback_data": "opt_2"}]
                ]
            })
        );
        assert!(!keyboard.is_empty());
        assert!(InlineKeyboardMarkup::new().is_empty());
    }

    #[test]
    fn test_parse_mode_wire_value() {
        assert_eq!(serde_json::to_value(ParseMode::Html).unwrap(), "HTML");
        assert_eq!(ParseMode::MarkdownV2.to_string(), "MarkdownV2");
    }
}
