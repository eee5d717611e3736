//! A two-step conversation that collects two strings and echoes them back.

use async_trait::async_trait;
use tracing::warn;

use courier::prelude::*;

enum Step {
    First,
    Second { first: String },
    Done,
}

pub struct DemoConversation {
    key: ConversationKey,
    bot: BoxedBot,
    step: Step,
}

impl DemoConversation {
    pub fn new(key: ConversationKey, bot: BoxedBot) -> Self {
        Self {
            key,
            bot,
            step: Step::First,
        }
    }

    async fn reply(&self, text: &str) {
        if let Err(e) = self.bot.send_message(self.key.chat_id, text, None, None).await {
            warn!(key = %self.key, error = %e, "Failed to send conversation reply");
        }
    }
}

#[async_trait]
impl Conversation for DemoConversation {
    fn key(&self) -> ConversationKey {
        self.key
    }

    async fn advance(&mut self, update: &Update) {
        // Button presses and empty messages don't move the flow.
        let Some(text) = update.as_message().map(|m| m.text.trim()).filter(|t| !t.is_empty())
        else {
            return;
        };

        if text == "/cancel" {
            self.step = Step::Done;
            self.reply("Cancelled.").await;
            return;
        }

        match std::mem::replace(&mut self.step, Step::Done) {
            Step::First => {
                self.step = Step::Second {
                    first: text.to_string(),
                };
                self.reply("Got it. Now please enter string 2:").await;
            }
            Step::Second { first } => {
                self.reply(&format!("Result: {first} {text}")).await;
            }
            Step::Done => {}
        }
    }

    fn is_closed(&self) -> bool {
        matches!(self.step, Step::Done)
    }

    fn name(&self) -> &'static str {
        "demo"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use super::*;

    #[derive(Default)]
    struct Transcript {
        lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Bot for Transcript {
        async fn call_api(&self, _method: &str, params: Value) -> ApiResult<Value> {
            let text = params["text"].as_str().unwrap_or_default().to_string();
            self.lines.lock().push(text);
            Ok(json!({"message_id": 1}))
        }
    }

    fn text(text: &str) -> Update {
        Update::message(
            1,
            MessageEvent {
                message_id: 1,
                chat_id: 3,
                user_id: 4,
                sender_display_name: "Ada".into(),
                text: text.into(),
            },
        )
    }

    #[tokio::test]
    async fn test_collects_two_strings() {
        let transcript = Arc::new(Transcript::default());
        let mut convo = DemoConversation::new(ConversationKey::new(3, 4), transcript.clone());

        convo.advance(&text("")).await;
        convo.advance(&text("hello")).await;
        assert!(!convo.is_closed());
        convo.advance(&text("world")).await;

        assert!(convo.is_closed());
        assert_eq!(
            *transcript.lines.lock(),
            vec!["Got it. Now please enter string 2:", "Result: hello world"]
        );
    }

    #[tokio::test]
    async fn test_cancel_closes() {
        let transcript = Arc::new(Transcript::default());
        let mut convo = DemoConversation::new(ConversationKey::new(3, 4), transcript.clone());

        convo.advance(&text("/cancel")).await;
        assert!(convo.is_closed());
        assert_eq!(*transcript.lines.lock(), vec!["Cancelled."]);
    }
}
