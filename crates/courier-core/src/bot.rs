//! Bot trait: the outbound side of the messaging API.
//!
//! A [`Bot`] only has to implement [`Bot::call_api`]; the typed helpers for
//! sending, editing and acknowledging are provided on top of it, so test
//! doubles can record raw calls and still exercise the same parameter
//! building as the real client.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::error::{ApiError, ApiResult};
use crate::keyboard::{InlineKeyboardMarkup, ParseMode};

/// The outbound-send capability shared by handlers and conversations.
///
/// # API Design
///
/// - `call_api`: raw API call with method name and JSON parameters
/// - `send_message` / `edit_message` / `answer_callback_query`: typed helpers
#[async_trait]
pub trait Bot: Send + Sync + 'static {
    /// Calls a raw API method and returns its `result` value.
    async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value>;

    /// Sends a text message and returns the new message's identifier.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
        parse_mode: Option<ParseMode>,
    ) -> ApiResult<i64> {
        let mut params = Map::new();
        params.insert("chat_id".into(), json!(chat_id));
        params.insert("text".into(), json!(text));
        insert_formatting(&mut params, keyboard, parse_mode)?;

        let result = self.call_api("sendMessage", Value::Object(params)).await?;
        result
            .get("message_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ApiError::UnexpectedResponse("sendMessage result has no message_id".into()))
    }

    /// Replaces the text (and optionally the keyboard) of an existing message.
    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
        parse_mode: Option<ParseMode>,
    ) -> ApiResult<()> {
        let mut params = Map::new();
        params.insert("chat_id".into(), json!(chat_id));
        params.insert("message_id".into(), json!(message_id));
        params.insert("text".into(), json!(text));
        insert_formatting(&mut params, keyboard, parse_mode)?;

        self.call_api("editMessageText", Value::Object(params))
            .await
            .map(|_| ())
    }

    /// Acknowledges a callback query, optionally showing a notification.
    async fn answer_callback_query(
        &self,
        query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> ApiResult<()> {
        let mut params = Map::new();
        params.insert("callback_query_id".into(), json!(query_id));
        if let Some(text) = text {
            params.insert("text".into(), json!(text));
        }
        if show_alert {
            params.insert("show_alert".into(), json!(true));
        }

        self.call_api("answerCallbackQuery", Value::Object(params))
            .await
            .map(|_| ())
    }
}

fn insert_formatting(
    params: &mut Map<String, Value>,
    keyboard: Option<&InlineKeyboardMarkup>,
    parse_mode: Option<ParseMode>,
) -> ApiResult<()> {
    if let Some(keyboard) = keyboard {
        params.insert("reply_markup".into(), serde_json::to_value(keyboard)?);
    }
    if let Some(mode) = parse_mode {
        params.insert("parse_mode".into(), json!(mode.as_str()));
    }
    Ok(())
}

/// A shared Bot trait object.
pub type BoxedBot = Arc<dyn Bot>;

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::keyboard::InlineKeyboardButton;

    #[derive(Default)]
    struct RecordingBot {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Bot for RecordingBot {
        async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
            self.calls.lock().unwrap().push((method.to_string(), params));
            match method {
                "sendMessage" => Ok(json!({"message_id": 55})),
                _ => Ok(json!(true)),
            }
        }
    }

    #[tokio::test]
    async fn test_send_message_builds_params() {
        let bot = RecordingBot::default();
        let keyboard =
            InlineKeyboardMarkup::new().row([InlineKeyboardButton::callback("A", "a")]);

        let id = bot
            .send_message(1, "hi", Some(&keyboard), Some(ParseMode::Html))
            .await
            .unwrap();
        assert_eq!(id, 55);

        let calls = bot.calls.lock().unwrap();
        let (method, params) = &calls[0];
        assert_eq!(method, "sendMessage");
        assert_eq!(params["chat_id"], 1);
        assert_eq!(params["text"], "hi");
        assert_eq!(params["parse_mode"], "HTML");
        assert_eq!(params["reply_markup"]["inline_keyboard"][0][0]["callback_data"], "a");
    }

    #[tokio::test]
    async fn test_answer_callback_query_omits_defaults() {
        let bot = RecordingBot::default();
        bot.answer_callback_query("q1", None, false).await.unwrap();
        bot.edit_message(1, 2, "edited", None, None).await.unwrap();

        let calls = bot.calls.lock().unwrap();
        assert_eq!(calls[0].1, json!({"callback_query_id": "q1"}));
        assert_eq!(calls[1].0, "editMessageText");
        assert!(calls[1].1.get("reply_markup").is_none());
    }
}
