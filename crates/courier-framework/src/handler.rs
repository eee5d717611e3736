//! Handler system.
//!
//! Handlers are plain async functions whose parameters implement
//! [`FromContext`], similar to Axum's handler system:
//!
//! ```rust,ignore
//! async fn start(bot: BoxedBot, msg: MessageEvent) {
//!     bot.send_message(msg.chat_id, "Hello!", None, None).await.ok();
//! }
//!
//! async fn echo(bot: BoxedBot, msg: MessageEvent) -> Result<(), ApiError> {
//!     bot.send_message(msg.chat_id, &format!("You said: {}", msg.text), None, None)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! A handler may return `()` or `Result<(), E>` for any displayable `E`; the
//! result is turned into a [`HandlerResult`] and logged by the dispatch pool.

use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};
use crate::extractor::FromContext;

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Values a handler may return.
pub trait HandlerOutput: Send {
    /// Converts the return value into the unit result.
    fn into_result(self) -> HandlerResult;
}

impl HandlerOutput for () {
    fn into_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E> HandlerOutput for Result<(), E>
where
    E: Display + Send,
{
    fn into_result(self) -> HandlerResult {
        self.map_err(|e| HandlerError::Failed(e.to_string()))
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// The core trait for update handlers.
///
/// Implemented automatically for async functions that take 0-8 parameters
/// implementing [`FromContext`] and return a [`HandlerOutput`].
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// The type of future calling this handler returns.
    type Future: Future<Output = HandlerResult> + Send + 'static;

    /// Call the handler with the given context.
    fn call(self, ctx: Arc<Context>) -> Self::Future;
}

// ============================================================================
// Type erasure
// ============================================================================

/// Wraps a handler function so it can be stored behind [`ErasedHandler`].
pub struct HandlerFn<F, T> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> HandlerFn<F, T> {
    /// Creates a new handler function wrapper.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

/// Type-erased handler trait for dynamic dispatch.
pub trait ErasedHandler: Send + Sync {
    /// Execute the handler with the given context.
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, T> ErasedHandler for HandlerFn<F, T>
where
    F: Handler<T>,
    T: 'static,
{
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self.f.clone().call(ctx))
    }
}

/// A type-erased handler that can be stored in the registry.
pub type BoxedHandler = Arc<dyn ErasedHandler>;

/// Convert a handler function into a boxed handler.
pub fn into_handler<F, T>(f: F) -> BoxedHandler
where
    F: Handler<T>,
    T: 'static,
{
    Arc::new(HandlerFn::new(f))
}

// ============================================================================
// Handler implementations for functions
// ============================================================================

impl<F, Fut, R> Handler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput,
{
    type Future = BoxFuture<'static, HandlerResult>;

    fn call(self, _ctx: Arc<Context>) -> Self::Future {
        Box::pin(async move { (self)().await.into_result() })
    }
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case)]
        impl<F, Fut, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: HandlerOutput,
            $( $ty: FromContext + Send + 'static, )*
        {
            type Future = BoxFuture<'static, HandlerResult>;

            fn call(self, ctx: Arc<Context>) -> Self::Future {
                Box::pin(async move {
                    $(
                        let $ty = $ty::from_context(&ctx)?;
                    )*

                    (self)($($ty,)*).await.into_result()
                })
            }
        }
    };
}

impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use courier_core::{BoxedBot, MessageEvent, Update};

    use super::*;
    use crate::conversations::ConversationRegistry;
    use crate::error::ExtractError;
    use crate::test_support::{MockBot, callback, text};

    fn context(update: Update) -> Arc<Context> {
        Arc::new(Context::new(
            Arc::new(update),
            Arc::new(MockBot::default()),
            ConversationRegistry::new(),
        ))
    }

    #[tokio::test]
    async fn test_handler_extracts_params() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let handler = into_handler(move |msg: MessageEvent, _bot: BoxedBot| {
            let seen = seen_clone.clone();
            async move {
                assert_eq!(msg.text, "hello");
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        handler.call(context(text(1, 2, 3, "hello"))).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_extraction_failure_skips_body() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let handler = into_handler(move |_msg: MessageEvent| {
            let seen = seen_clone.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        let result = handler.call(context(callback(1, 2, 3, "opt_1"))).await;
        assert!(matches!(
            result,
            Err(HandlerError::Extract(ExtractError::PayloadMismatch { .. }))
        ));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_output() {
        async fn failing(_msg: MessageEvent) -> Result<(), String> {
            Err("boom".to_string())
        }
        async fn no_params() {}

        let result = into_handler(failing).call(context(text(1, 2, 3, "x"))).await;
        assert!(matches!(result, Err(HandlerError::Failed(ref m)) if m == "boom"));

        let result = into_handler(no_params).call(context(text(1, 2, 3, "x"))).await;
        assert!(result.is_ok());
    }
}
