//! The inbound side of the messaging API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportResult;

/// Parameters for one long-poll fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollParams {
    /// Identifier of the first update to return.
    pub offset: i64,
    /// How long the server may hold the request open waiting for updates.
    pub timeout: Duration,
}

/// A long-poll endpoint that returns raw update batches.
///
/// Implementations return the undecoded response body; decoding is left to
/// [`decode_batch`](crate::update::decode_batch) so that a malformed batch
/// can be told apart from a transport failure.
#[async_trait]
pub trait UpdateSource: Send + Sync + 'static {
    /// Fetches the next batch, blocking for up to `params.timeout`.
    async fn fetch(&self, params: &PollParams) -> TransportResult<Vec<u8>>;
}

/// A shared UpdateSource trait object.
pub type BoxedSource = Arc<dyn UpdateSource>;
