//! Inbound update model and the batch decoder.
//!
//! An [`Update`] is one event pulled from the long-poll endpoint. It carries
//! at most one [`Payload`]; update kinds the dispatcher does not understand
//! decode with `payload: None` so that the offset still moves past them.
//!
//! [`decode_batch`] turns the raw `getUpdates` response body into an
//! [`UpdateBatch`]. Decoding is all-or-nothing: a single malformed record fails
//! the whole batch.

use crate::conversation::ConversationKey;
use crate::error::{DecodeError, DecodeResult};

/// One inbound event from the messaging API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Monotonic identifier assigned by the server.
    pub update_id: i64,
    /// The populated payload variant, if the kind is understood.
    pub payload: Option<Payload>,
}

/// The payload variants an [`Update`] may carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A new message in a chat.
    Message(MessageEvent),
    /// An inline keyboard button was pressed.
    CallbackQuery(CallbackQueryEvent),
}

/// A message sent to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub message_id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub sender_display_name: String,
    /// Message text; empty for media and other non-text messages.
    pub text: String,
}

/// A callback query produced by an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackQueryEvent {
    /// Identifier used to acknowledge the query.
    pub query_id: String,
    pub chat_id: i64,
    /// Message the keyboard is attached to, `0` when unknown.
    pub message_id: i64,
    pub user_id: i64,
    pub sender_display_name: String,
    pub data: String,
}

impl Update {
    /// Creates an update with the given payload.
    pub fn new(update_id: i64, payload: Option<Payload>) -> Self {
        Self { update_id, payload }
    }

    /// Shorthand for an update carrying a [`MessageEvent`].
    pub fn message(update_id: i64, message: MessageEvent) -> Self {
        Self::new(update_id, Some(Payload::Message(message)))
    }

    /// Shorthand for an update carrying a [`CallbackQueryEvent`].
    pub fn callback_query(update_id: i64, query: CallbackQueryEvent) -> Self {
        Self::new(update_id, Some(Payload::CallbackQuery(query)))
    }

    /// Returns the `(chat, user)` identity of the populated payload.
    pub fn key(&self) -> Option<ConversationKey> {
        match self.payload.as_ref()? {
            Payload::Message(m) => Some(ConversationKey::new(m.chat_id, m.user_id)),
            Payload::CallbackQuery(q) => Some(ConversationKey::new(q.chat_id, q.user_id)),
        }
    }

    /// Returns the message payload, if any.
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match &self.payload {
            Some(Payload::Message(m)) => Some(m),
            _ => None,
        }
    }

    /// Returns the callback query payload, if any.
    pub fn as_callback_query(&self) -> Option<&CallbackQueryEvent> {
        match &self.payload {
            Some(Payload::CallbackQuery(q)) => Some(q),
            _ => None,
        }
    }

    /// Short name of the payload kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match &self.payload {
            Some(Payload::Message(_)) => "message",
            Some(Payload::CallbackQuery(_)) => "callback_query",
            None => "unsupported",
        }
    }
}

/// A decoded `getUpdates` response.
#[derive(Debug, Clone, Default)]
pub struct UpdateBatch {
    /// The server's success flag.
    pub ok: bool,
    /// Updates in server order. Empty when `ok` is false.
    pub updates: Vec<Update>,
    /// Error description reported alongside `ok: false`.
    pub description: Option<String>,
    /// Error code reported alongside `ok: false`.
    pub error_code: Option<i64>,
}

/// Decodes a raw long-poll response body.
///
/// Returns [`DecodeError`] if the body is not a valid envelope or any record in
/// `result` is malformed. An envelope with `ok: false` decodes successfully
/// with no updates.
pub fn decode_batch(body: &[u8]) -> DecodeResult<UpdateBatch> {
    let envelope: wire::Envelope = serde_json::from_slice(body)?;

    if !envelope.ok {
        return Ok(UpdateBatch {
            ok: false,
            updates: Vec::new(),
            description: envelope.description,
            error_code: envelope.error_code,
        });
    }

    let records = envelope.result.ok_or(DecodeError::MissingResult)?;
    let updates = records.into_iter().map(Update::from_raw).collect();

    Ok(UpdateBatch {
        ok: true,
        updates,
        description: envelope.description,
        error_code: envelope.error_code,
    })
}

mod wire {
    use serde::Deserialize;

    #[derive(Deserialize)]
    pub(super) struct Envelope {
        pub ok: bool,
        #[serde(default)]
        pub result: Option<Vec<RawUpdate>>,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub error_code: Option<i64>,
    }

    #[derive(Deserialize)]
    pub(super) struct RawUpdate {
        pub update_id: i64,
        #[serde(default)]
        pub message: Option<RawMessage>,
        #[serde(default)]
        pub callback_query: Option<RawCallbackQuery>,
    }

    #[derive(Deserialize)]
    pub(super) struct RawMessage {
        pub message_id: i64,
        pub chat: RawChat,
        #[serde(default)]
        pub from: Option<RawUser>,
        #[serde(default)]
        pub text: Option<String>,
    }

    #[derive(Deserialize)]
    pub(super) struct RawChat {
        pub id: i64,
    }

    #[derive(Deserialize)]
    pub(super) struct RawUser {
        pub id: i64,
        #[serde(default)]
        pub first_name: String,
        #[serde(default)]
        pub last_name: Option<String>,
    }

    #[derive(Deserialize)]
    pub(super) struct RawCallbackQuery {
        pub id: String,
        pub from: RawUser,
        #[serde(default)]
        pub message: Option<RawMessage>,
        #[serde(default)]
        pub data: Option<String>,
    }

    impl RawUser {
        pub fn display_name(&self) -> String {
            match &self.last_name {
                Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
                _ => self.first_name.clone(),
            }
        }
    }
}

impl Update {
    fn from_raw(raw: wire::RawUpdate) -> Self {
        // Message takes precedence; the server never populates both.
        let payload = if let Some(msg) = raw.message {
            let (user_id, sender_display_name) = match &msg.from {
                Some(user) => (user.id, user.display_name()),
                None => (msg.chat.id, String::new()),
            };
            Some(Payload::Message(MessageEvent {
                message_id: msg.message_id,
                chat_id: msg.chat.id,
                user_id,
                sender_display_name,
                text: msg.text.unwrap_or_default(),
            }))
        } else if let Some(query) = raw.callback_query {
            let (chat_id, message_id) = match &query.message {
                Some(msg) => (msg.chat.id, msg.message_id),
                None => (query.from.id, 0),
            };
            Some(Payload::CallbackQuery(CallbackQueryEvent {
                query_id: query.id,
                chat_id,
                message_id,
                user_id: query.from.id,
                sender_display_name: query.from.display_name(),
                data: query.data.unwrap_or_default(),
            }))
        } else {
            None
        };

        Self {
            update_id: raw.update_id,
            payload,
        }
    }
}
