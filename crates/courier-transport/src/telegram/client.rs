//! HTTP client for the Telegram Bot API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};

use courier_core::{
    ApiError, ApiResult, Bot, PollParams, TransportError, TransportResult, UpdateSource,
};

const DEFAULT_API_URL: &str = "https://api.telegram.org";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(40);
const MAX_ERROR_BODY: usize = 256;

/// Envelope of every Bot API response.
#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

/// A Telegram Bot API client.
///
/// One client serves both directions: it fetches updates for the poll loop
/// and performs the outbound calls handlers make. Share it behind an `Arc`.
pub struct TelegramClient {
    client: Client,
    api_url: String,
    endpoint: String,
    allowed_updates: Vec<String>,
    limit: Option<u32>,
}

impl TelegramClient {
    pub fn builder(token: impl Into<String>) -> TelegramClientBuilder {
        TelegramClientBuilder::new(token)
    }

    /// Base URL of the API, without the token.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.endpoint)
    }

    async fn post(&self, method: &str, body: &Value) -> TransportResult<Response> {
        trace!(method, "Calling Bot API");
        self.client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(method, e))
    }
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("allowed_updates", &self.allowed_updates)
            .field("limit", &self.limit)
            .finish()
    }
}

/// Maps a reqwest error, dropping the URL since it embeds the token.
fn request_error(method: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            method: method.to_string(),
        }
    } else {
        TransportError::RequestFailed {
            method: method.to_string(),
            reason: err.without_url().to_string(),
        }
    }
}

fn truncate(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn fetch(&self, params: &PollParams) -> TransportResult<Vec<u8>> {
        const METHOD: &str = "getUpdates";

        let mut body = json!({
            "offset": params.offset,
            "timeout": params.timeout.as_secs(),
        });
        if let Some(limit) = self.limit {
            body["limit"] = json!(limit);
        }
        if !self.allowed_updates.is_empty() {
            body["allowed_updates"] = json!(self.allowed_updates);
        }

        let response = self.post(METHOD, &body).await?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| request_error(METHOD, e))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                method: METHOD.to_string(),
                status: status.as_u16(),
                body: truncate(&bytes),
            });
        }

        debug!(offset = params.offset, bytes = bytes.len(), "Fetched updates");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Bot for TelegramClient {
    async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
        let response = self.post(method, &params).await?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| request_error(method, e))?;

        // Error responses usually carry an `ok: false` envelope; prefer it
        // over the bare status.
        let envelope: Envelope = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(ApiError::UnexpectedResponse(format!("{method}: {e}")));
            }
            Err(_) => {
                return Err(TransportError::Status {
                    method: method.to_string(),
                    status: status.as_u16(),
                    body: truncate(&bytes),
                }
                .into());
            }
        };

        if !envelope.ok {
            return Err(ApiError::Api {
                code: envelope.error_code.unwrap_or(i64::from(status.as_u16())),
                description: envelope.description.unwrap_or_default(),
            });
        }

        envelope
            .result
            .ok_or_else(|| ApiError::UnexpectedResponse(format!("{method}: missing result")))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`TelegramClient`].
pub struct TelegramClientBuilder {
    token: String,
    api_url: String,
    request_timeout: Duration,
    allowed_updates: Vec<String>,
    limit: Option<u32>,
}

impl TelegramClientBuilder {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            allowed_updates: Vec::new(),
            limit: None,
        }
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// HTTP timeout per request. Must exceed the long-poll timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Update kinds to request; empty means the server's default.
    pub fn allowed_updates(mut self, kinds: Vec<String>) -> Self {
        self.allowed_updates = kinds;
        self
    }

    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn build(self) -> TransportResult<TelegramClient> {
        if self.token.is_empty() {
            return Err(TransportError::InvalidConfig("bot token is empty".into()));
        }

        let client = ClientBuilder::new()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;

        let api_url = self.api_url.trim_end_matches('/').to_string();
        let endpoint = format!("{api_url}/bot{}", self.token);

        Ok(TelegramClient {
            client,
            api_url,
            endpoint,
            allowed_updates: self.allowed_updates,
            limit: self.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use courier_core::{InlineKeyboardButton, InlineKeyboardMarkup};

    use super::*;

    const TOKEN: &str = "123:secret";

    fn client(url: &str) -> TelegramClient {
        TelegramClient::builder(TOKEN)
            .api_url(format!("{url}/"))
            .allowed_updates(vec!["message".into(), "callback_query".into()])
            .limit(Some(50))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_poll_parameters() {
        let mut server = Server::new_async().await;
        let body = r#"{"ok":true,"result":[]}"#;
        let mock = server
            .mock("POST", "/bot123:secret/getUpdates")
            .match_body(Matcher::PartialJson(json!({
                "offset": 17,
                "timeout": 30,
                "limit": 50,
                "allowed_updates": ["message", "callback_query"],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let fetched = client(&server.url())
            .fetch(&PollParams {
                offset: 17,
                timeout: Duration::from_secs(30),
            })
            .await
            .unwrap();

        assert_eq!(fetched, body.as_bytes());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_maps_http_status() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/bot123:secret/getUpdates")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let err = client(&server.url())
            .fetch(&PollParams {
                offset: 0,
                timeout: Duration::from_secs(1),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Status { status: 502, ref body, .. } if body == "Bad Gateway"));
    }

    #[tokio::test]
    async fn test_send_message_returns_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:secret/sendMessage")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": 5,
                "text": "Please choose an option:",
                "reply_markup": {"inline_keyboard": [[{"text": "Option 1", "callback_data": "opt_1"}]]},
            })))
            .with_status(200)
            .with_body(r#"{"ok":true,"result":{"message_id":77,"chat":{"id":5}}}"#)
            .create_async()
            .await;

        let keyboard =
            InlineKeyboardMarkup::new().row([InlineKeyboardButton::callback("Option 1", "opt_1")]);
        let id = client(&server.url())
            .send_message(5, "Please choose an option:", Some(&keyboard), None)
            .await
            .unwrap();

        assert_eq!(id, 77);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_envelope() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/bot123:secret/editMessageText")
            .with_status(400)
            .with_body(
                r#"{"ok":false,"error_code":400,"description":"Bad Request: message is not modified"}"#,
            )
            .create_async()
            .await;

        let err = client(&server.url())
            .edit_message(5, 77, "same", None, None)
            .await
            .unwrap_err();

        match err {
            ApiError::Api { code, description } => {
                assert_eq!(code, 400);
                assert!(description.contains("not modified"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_error_hides_token() {
        // Nothing listens on port 1.
        let err = client("http://127.0.0.1:1")
            .call_api("getMe", json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = client("https://api.telegram.org");
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            TelegramClient::builder("").build(),
            Err(TransportError::InvalidConfig(_))
        ));
    }
}
