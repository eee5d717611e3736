//! The long-poll loop.
//!
//! One [`Poller`] drives fetch → decode → dedup → dispatch, sequentially and
//! in batch order. It never waits for a handler to finish; under the `wait`
//! saturation policy it does wait for a free pool slot.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use courier_core::{BoxedSource, decode_batch};
use courier_framework::{Dispatcher, OffsetTracker, Route};

/// What one iteration of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A batch was fetched; `dispatched` of its `fetched` updates were
    /// handed to the pool (the rest were duplicates or dropped by routing).
    Dispatched { fetched: usize, dispatched: usize },
    /// The fetch itself failed.
    TransportFailed,
    /// The server answered with `ok == false`.
    Rejected,
    /// The response could not be decoded.
    DecodeFailed,
    /// Cancellation was requested.
    Cancelled,
}

impl PollOutcome {
    /// Failed iterations are followed by the retry delay.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::TransportFailed | Self::Rejected | Self::DecodeFailed
        )
    }
}

/// The long-poll loop. Owns the offset tracker.
pub struct Poller {
    source: BoxedSource,
    dispatcher: Dispatcher,
    offsets: OffsetTracker,
    retry_delay: Duration,
}

impl Poller {
    pub fn new(
        source: BoxedSource,
        dispatcher: Dispatcher,
        offsets: OffsetTracker,
        retry_delay: Duration,
    ) -> Self {
        Self {
            source,
            dispatcher,
            offsets,
            retry_delay,
        }
    }

    /// The offset the next fetch will use.
    pub fn offset(&self) -> i64 {
        self.offsets.current()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs a single fetch-and-dispatch iteration.
    ///
    /// The offset moves only after a batch decodes with `ok == true`, so a
    /// failed iteration can be retried without losing updates.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> PollOutcome {
        let params = self.offsets.next();
        trace!(offset = params.offset, "Fetching updates");

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            fetched = self.source.fetch(&params) => fetched,
        };

        let body = match fetched {
            Ok(body) => body,
            Err(e) => {
                warn!(offset = params.offset, error = %e, "Fetching updates failed");
                return PollOutcome::TransportFailed;
            }
        };

        let batch = match decode_batch(&body) {
            Ok(batch) => batch,
            Err(e) => {
                error!(offset = params.offset, error = %e, "Discarding undecodable batch");
                return PollOutcome::DecodeFailed;
            }
        };

        if !batch.ok {
            warn!(
                offset = params.offset,
                error_code = ?batch.error_code,
                description = batch.description.as_deref().unwrap_or(""),
                "Server rejected the fetch"
            );
            return PollOutcome::Rejected;
        }

        let fetched = batch.updates.len();
        let fresh = self.offsets.accept(batch.updates);
        if fresh.len() < fetched {
            debug!(
                skipped = fetched - fresh.len(),
                "Skipped already delivered updates"
            );
        }

        let mut dispatched = 0;
        for update in fresh {
            let update_id = update.update_id;
            let route = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(update_id, "Cancelled while waiting for a dispatch slot");
                    return PollOutcome::Cancelled;
                }
                route = self.dispatcher.dispatch(update) => route,
            };
            trace!(update_id, route = ?route, "Update routed");
            if !matches!(route, Route::Dropped(_)) {
                dispatched += 1;
            }
        }

        PollOutcome::Dispatched {
            fetched,
            dispatched,
        }
    }

    /// Polls until `cancel` fires. Returns the final offset.
    pub async fn run(mut self, cancel: CancellationToken) -> i64 {
        info!(offset = self.offset(), "Polling started");

        while !cancel.is_cancelled() {
            let outcome = self.poll_once(&cancel).await;
            if outcome == PollOutcome::Cancelled {
                break;
            }
            if outcome.is_failure() {
                debug!(delay = ?self.retry_delay, "Retrying after delay");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }

        info!(offset = self.offset(), "Polling stopped");
        self.offset()
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("offset", &self.offsets.current())
            .field("retry_delay", &self.retry_delay)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use courier_core::{
        ApiResult, Bot, MessageEvent, PollParams, TransportError, TransportResult, UpdateSource,
    };
    use courier_framework::{ConversationRegistry, DispatchPool, HandlerRegistry, PoolConfig};

    use super::*;

    /// Plays back canned responses, then behaves like an idle long poll.
    #[derive(Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<TransportResult<Vec<u8>>>>,
        offsets: Mutex<Vec<i64>>,
    }

    impl ScriptedSource {
        fn with(responses: Vec<TransportResult<Vec<u8>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(responses.into()),
                offsets: Mutex::default(),
            })
        }

        fn offsets(&self) -> Vec<i64> {
            self.offsets.lock().clone()
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn fetch(&self, params: &PollParams) -> TransportResult<Vec<u8>> {
            self.offsets.lock().push(params.offset);
            let next = self.script.lock().pop_front();
            match next {
                Some(response) => response,
                None => std::future::pending().await,
            }
        }
    }

    struct SilentBot;

    #[async_trait]
    impl Bot for SilentBot {
        async fn call_api(&self, _method: &str, _params: Value) -> ApiResult<Value> {
            Ok(json!(true))
        }
    }

    fn text_batch(ids: &[i64]) -> TransportResult<Vec<u8>> {
        let result: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "update_id": id,
                    "message": {
                        "message_id": id,
                        "chat": {"id": 7},
                        "from": {"id": 7, "first_name": "Ada"},
                        "text": format!("hello {id}"),
                    }
                })
            })
            .collect();
        Ok(json!({"ok": true, "result": result}).to_string().into_bytes())
    }

    fn poller(source: Arc<ScriptedSource>, seen: Arc<Mutex<Vec<String>>>) -> Poller {
        let handlers = HandlerRegistry::new().text(move |msg: MessageEvent| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().push(msg.text);
            }
        });
        let dispatcher = Dispatcher::new(
            handlers,
            ConversationRegistry::new(),
            Arc::new(SilentBot),
            DispatchPool::new(PoolConfig::default()),
        );
        Poller::new(
            source,
            dispatcher,
            OffsetTracker::new(Duration::from_secs(30)),
            Duration::from_secs(5),
        )
    }

    async fn settle(poller: &Poller) {
        while poller.dispatcher().pool().in_flight() > 0 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_batch_advances_offset_to_last_plus_one() {
        let source = ScriptedSource::with(vec![text_batch(&[10, 11, 12])]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut poller = poller(Arc::clone(&source), Arc::clone(&seen));
        let cancel = CancellationToken::new();

        let outcome = poller.poll_once(&cancel).await;
        assert_eq!(
            outcome,
            PollOutcome::Dispatched {
                fetched: 3,
                dispatched: 3
            }
        );
        assert_eq!(poller.offset(), 13);

        settle(&poller).await;
        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(seen, vec!["hello 10", "hello 11", "hello 12"]);
    }

    #[tokio::test]
    async fn test_failures_leave_offset_unchanged() {
        let source = ScriptedSource::with(vec![
            text_batch(&[1]),
            Ok(b"{not json".to_vec()),
            Ok(br#"{"ok": false, "error_code": 409, "description": "Conflict"}"#.to_vec()),
            Err(TransportError::Timeout {
                method: "getUpdates".into(),
            }),
            text_batch(&[2]),
        ]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut poller = poller(Arc::clone(&source), seen);
        let cancel = CancellationToken::new();

        assert!(matches!(
            poller.poll_once(&cancel).await,
            PollOutcome::Dispatched { .. }
        ));
        assert_eq!(poller.poll_once(&cancel).await, PollOutcome::DecodeFailed);
        assert_eq!(poller.poll_once(&cancel).await, PollOutcome::Rejected);
        assert_eq!(poller.poll_once(&cancel).await, PollOutcome::TransportFailed);
        assert_eq!(poller.offset(), 2);

        poller.poll_once(&cancel).await;
        assert_eq!(source.offsets(), vec![0, 2, 2, 2, 2]);
        assert_eq!(poller.offset(), 3);
    }

    #[tokio::test]
    async fn test_redelivered_updates_are_not_dispatched_twice() {
        let source = ScriptedSource::with(vec![text_batch(&[4, 5]), text_batch(&[5, 6])]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut poller = poller(Arc::clone(&source), Arc::clone(&seen));
        let cancel = CancellationToken::new();

        poller.poll_once(&cancel).await;
        let outcome = poller.poll_once(&cancel).await;
        assert_eq!(
            outcome,
            PollOutcome::Dispatched {
                fetched: 2,
                dispatched: 1
            }
        );

        settle(&poller).await;
        assert_eq!(seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_idle_fetch() {
        let source = ScriptedSource::with(Vec::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let poller = poller(source, seen);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(poller.run(cancel.clone()));
        tokio::task::yield_now().await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_after_failure() {
        let source = ScriptedSource::with(vec![
            Err(TransportError::RequestFailed {
                method: "getUpdates".into(),
                reason: "connection refused".into(),
            }),
            text_batch(&[1]),
        ]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let poller = poller(Arc::clone(&source), seen);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poller.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.offsets().len(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        // The retried fetch succeeded and the third fetch is now idle.
        assert_eq!(source.offsets(), vec![0, 0, 2]);

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), 2);
    }
}
