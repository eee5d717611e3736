//! Bounded dispatch pool.
//!
//! Every routed update runs as a detached unit on the pool. The pool bounds
//! how many units are in flight with a semaphore; when it is full the
//! [`Saturation`] policy decides whether the submitter waits for a slot
//! (backpressure onto the poll loop) or the unit is dropped.
//!
//! Each unit is isolated: a returned error, a panic, or an expired timeout is
//! logged at the unit boundary and never reaches the submitter.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, TryAcquireError};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, debug, error, warn};

use crate::error::HandlerResult;

/// What to do when every slot of the pool is busy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Saturation {
    /// Wait for a slot to free up.
    #[default]
    Wait,
    /// Drop the unit immediately.
    Reject,
}

/// Pool sizing and unit limits.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of units running at once.
    pub max_in_flight: usize,
    /// Behaviour when `max_in_flight` is reached.
    pub saturation: Saturation,
    /// Per-unit time limit; `None` disables it. Conversation units apply it
    /// to `advance` only, once the entry lock is held.
    pub unit_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            saturation: Saturation::Wait,
            unit_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Result of [`DispatchPool::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The unit was spawned.
    Spawned,
    /// The pool was full and the policy is [`Saturation::Reject`].
    Rejected,
    /// The pool is shutting down.
    Closed,
}

struct PoolInner {
    config: PoolConfig,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    rejected: AtomicU64,
}

/// Bounded executor for dispatched units.
///
/// Cloning is cheap; all clones share the same slots.
#[derive(Clone)]
pub struct DispatchPool {
    inner: Arc<PoolInner>,
}

impl DispatchPool {
    /// Creates a pool with the given configuration.
    ///
    /// A `max_in_flight` of zero is raised to one.
    pub fn new(config: PoolConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Self {
            inner: Arc::new(PoolInner {
                config,
                slots,
                tracker: TaskTracker::new(),
                rejected: AtomicU64::new(0),
            }),
        }
    }

    /// The pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Number of units spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Number of units dropped because the pool was full.
    pub fn rejected(&self) -> u64 {
        self.inner.rejected.load(Ordering::Relaxed)
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.slots.is_closed()
    }

    /// Submits a unit of work, running it inside `span`.
    pub async fn submit<F>(&self, span: Span, unit: F) -> Submission
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.submit_with_timeout(span, self.inner.config.unit_timeout, unit)
            .await
    }

    /// Submits a unit with its own time limit instead of the configured one.
    ///
    /// `None` lets the unit run until it finishes. Used for units that
    /// enforce a narrower limit themselves.
    pub async fn submit_with_timeout<F>(
        &self,
        span: Span,
        timeout: Option<Duration>,
        unit: F,
    ) -> Submission
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        let slots = Arc::clone(&self.inner.slots);
        let permit = match self.inner.config.saturation {
            Saturation::Wait => match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Submission::Closed,
            },
            Saturation::Reject => match slots.try_acquire_owned() {
                Ok(permit) => permit,
                Err(TryAcquireError::NoPermits) => {
                    self.inner.rejected.fetch_add(1, Ordering::Relaxed);
                    let _enter = span.enter();
                    warn!(
                        max_in_flight = self.inner.config.max_in_flight,
                        "Dispatch pool saturated, dropping update"
                    );
                    return Submission::Rejected;
                }
                Err(TryAcquireError::Closed) => return Submission::Closed,
            },
        };

        self.inner.tracker.spawn(
            async move {
                let _permit = permit;
                let unit = AssertUnwindSafe(unit).catch_unwind();
                let outcome = match timeout {
                    Some(limit) => tokio::time::timeout(limit, unit).await.ok(),
                    None => Some(unit.await),
                };

                match outcome {
                    Some(Ok(Ok(()))) => debug!("Unit finished"),
                    Some(Ok(Err(e))) => error!(error = %e, "Handler failed"),
                    Some(Err(panic)) => {
                        error!(panic = %panic_message(panic.as_ref()), "Handler panicked")
                    }
                    None => warn!(
                        timeout_ms = timeout.map_or(0, |t| t.as_millis() as u64),
                        "Handler timed out"
                    ),
                }
            }
            .instrument(span),
        );

        Submission::Spawned
    }

    /// Stops accepting units. Units already spawned keep running.
    pub fn close(&self) {
        self.inner.slots.close();
        self.inner.tracker.close();
    }

    /// Closes the pool and waits up to `grace` for running units.
    ///
    /// Returns `true` if every unit finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.close();
        let remaining = self.in_flight();
        if remaining > 0 {
            debug!(remaining, grace_ms = grace.as_millis() as u64, "Waiting for dispatched units");
        }
        match tokio::time::timeout(grace, self.inner.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(remaining = self.in_flight(), "Dispatched units still running after grace period");
                false
            }
        }
    }
}

impl Default for DispatchPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl std::fmt::Debug for DispatchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchPool")
            .field("config", &self.inner.config)
            .field("in_flight", &self.in_flight())
            .field("rejected", &self.rejected())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Notify;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;
    use crate::error::HandlerError;

    fn pool(max_in_flight: usize, saturation: Saturation) -> DispatchPool {
        DispatchPool::new(PoolConfig {
            max_in_flight,
            saturation,
            unit_timeout: Some(Duration::from_secs(5)),
        })
    }

    #[tokio::test]
    async fn test_reject_when_saturated() {
        let pool = pool(1, Saturation::Reject);
        let gate = Arc::new(Notify::new());

        let blocker = gate.clone();
        let first = pool
            .submit(Span::none(), async move {
                blocker.notified().await;
                Ok(())
            })
            .await;
        assert_eq!(first, Submission::Spawned);

        let second = pool.submit(Span::none(), async { Ok(()) }).await;
        assert_eq!(second, Submission::Rejected);
        assert_eq!(pool.rejected(), 1);

        gate.notify_one();
        assert!(pool.shutdown(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_wait_applies_backpressure() {
        let pool = pool(1, Saturation::Wait);
        let gate = Arc::new(Notify::new());
        let done = Arc::new(AtomicUsize::new(0));

        let blocker = gate.clone();
        pool.submit(Span::none(), async move {
            blocker.notified().await;
            Ok(())
        })
        .await;

        let counter = done.clone();
        let mut waiting = task::spawn(pool.submit(Span::none(), async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        assert_pending!(waiting.poll());

        gate.notify_one();
        while !waiting.is_woken() {
            tokio::task::yield_now().await;
        }
        assert_ready_eq!(waiting.poll(), Submission::Spawned);

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    async fn explode() -> HandlerResult {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_panic_and_error_are_contained() {
        let pool = pool(4, Saturation::Wait);
        pool.submit(Span::none(), explode()).await;
        pool.submit(Span::none(), async { Err(HandlerError::Failed("nope".into())) })
            .await;

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unit_timeout_releases_slot() {
        let pool = DispatchPool::new(PoolConfig {
            max_in_flight: 1,
            saturation: Saturation::Reject,
            unit_timeout: Some(Duration::from_millis(100)),
        });

        pool.submit(Span::none(), std::future::pending()).await;
        assert_eq!(pool.submit(Span::none(), async { Ok(()) }).await, Submission::Rejected);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(pool.submit(Span::none(), async { Ok(()) }).await, Submission::Spawned);
        assert!(pool.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_closed_pool_refuses_units() {
        let pool = pool(2, Saturation::Wait);
        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.submit(Span::none(), async { Ok(()) }).await, Submission::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_grace_expires() {
        let pool = DispatchPool::new(PoolConfig {
            max_in_flight: 1,
            saturation: Saturation::Wait,
            unit_timeout: None,
        });
        pool.submit(Span::none(), std::future::pending()).await;
        assert!(!pool.shutdown(Duration::from_millis(50)).await);
        assert_eq!(pool.in_flight(), 1);
    }
}
