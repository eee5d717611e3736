//! Shared fixtures for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use courier_core::{ApiResult, Bot, CallbackQueryEvent, MessageEvent, Update};

/// Records every API call and answers with plausible results.
#[derive(Default)]
pub struct MockBot {
    pub calls: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl Bot for MockBot {
    async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
        let mut calls = self.calls.lock();
        calls.push((method.to_string(), params));
        match method {
            "sendMessage" => Ok(json!({"message_id": calls.len()})),
            _ => Ok(json!(true)),
        }
    }
}

pub fn text(update_id: i64, chat_id: i64, user_id: i64, text: &str) -> Update {
    Update::message(
        update_id,
        MessageEvent {
            message_id: update_id,
            chat_id,
            user_id,
            sender_display_name: "Tester".into(),
            text: text.into(),
        },
    )
}

pub fn callback(update_id: i64, chat_id: i64, user_id: i64, data: &str) -> Update {
    Update::callback_query(
        update_id,
        CallbackQueryEvent {
            query_id: format!("q{update_id}"),
            chat_id,
            message_id: 1,
            user_id,
            sender_display_name: "Tester".into(),
            data: data.into(),
        },
    )
}
