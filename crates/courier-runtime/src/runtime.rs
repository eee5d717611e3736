//! Runtime orchestration.
//!
//! [`CourierRuntime`] wires configuration, logging, the transport, the
//! handler registry and the poll loop together, and shuts everything down
//! on Ctrl+C or SIGTERM.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! CourierRuntime::new()
//!     .command("start", start)
//!     .text(echo)
//!     .run()
//!     .await?;
//! ```
//!
//! Custom configuration:
//!
//! ```rust,ignore
//! let runtime = CourierRuntime::builder()
//!     .config_file("deploy/courier.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::future::Future;
use std::path::Path;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use courier_core::{BoxedBot, BoxedSource};
use courier_framework::{
    ConversationRegistry, DispatchPool, Dispatcher, Handler, HandlerRegistry, OffsetTracker,
};

use crate::config::{ConfigLoader, ConfigResult, CourierConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::poller::Poller;

/// The main Courier runtime.
pub struct CourierRuntime {
    config: CourierConfig,
    handlers: HandlerRegistry,
    conversations: ConversationRegistry,
    transport: Option<(BoxedBot, BoxedSource)>,
    shutdown: CancellationToken,
}

impl CourierRuntime {
    /// Creates a runtime from the default configuration sources.
    ///
    /// Falls back to built-in defaults if loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new().load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config ({e}), using defaults");
            CourierConfig::default()
        });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration and
    /// initializes logging from it.
    pub fn from_config(config: &CourierConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            api_url = %config.bot.api_url,
            poll_timeout_secs = config.polling.timeout_secs,
            max_in_flight = config.dispatch.max_in_flight,
            saturation = ?config.dispatch.saturation,
            "Courier runtime initialized"
        );

        Self {
            config: config.clone(),
            handlers: HandlerRegistry::new(),
            conversations: ConversationRegistry::new(),
            transport: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// Uses the given bot and update source instead of the HTTP client.
    pub fn with_transport(mut self, bot: BoxedBot, source: BoxedSource) -> Self {
        self.transport = Some((bot, source));
        self
    }

    /// Registers a command handler.
    pub fn command<H, T>(mut self, token: &str, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.handlers = self.handlers.command(token, handler);
        self
    }

    /// Registers the generic text handler.
    pub fn text<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.handlers = self.handlers.text(handler);
        self
    }

    /// Registers the callback handler.
    pub fn callback<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.handlers = self.handlers.callback(handler);
        self
    }

    /// Replaces the whole handler registry.
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// The conversation registry handlers will see.
    pub fn conversations(&self) -> &ConversationRegistry {
        &self.conversations
    }

    /// A token that stops the runtime when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs until Ctrl+C, SIGTERM or the shutdown token. Returns the final
    /// offset.
    pub async fn run(self) -> RuntimeResult<i64> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes or the shutdown token is cancelled.
    ///
    /// Polling stops first; in-flight handlers then get
    /// `dispatch.shutdown_grace_secs` to finish.
    pub async fn run_until<F>(self, shutdown: F) -> RuntimeResult<i64>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            handlers,
            conversations,
            transport,
            shutdown: cancel,
        } = self;

        let (bot, source) = match transport {
            Some(transport) => transport,
            None => http_transport(&config)?,
        };

        if handlers.is_empty() {
            warn!("No handlers registered; updates will only reach conversations");
        }

        let pool = DispatchPool::new(config.dispatch.pool_config());
        let dispatcher = Dispatcher::new(handlers, conversations, bot, pool.clone());
        let poller = Poller::new(
            source,
            dispatcher,
            OffsetTracker::new(config.polling.timeout()),
            config.polling.retry_delay(),
        );

        let polling = poller.run(cancel.clone());
        tokio::pin!(polling);

        let finished = tokio::select! {
            offset = &mut polling => Some(offset),
            () = shutdown => None,
        };
        let offset = match finished {
            Some(offset) => offset,
            None => {
                cancel.cancel();
                polling.await
            }
        };

        let grace = config.dispatch.shutdown_grace();
        if !pool.shutdown(grace).await {
            warn!(
                grace = ?grace,
                in_flight = pool.in_flight(),
                "Handlers still running after the grace period"
            );
        }

        info!(offset, "Courier runtime stopped");
        Ok(offset)
    }
}

impl Default for CourierRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CourierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierRuntime")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .field("conversations", &self.conversations)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

#[cfg(feature = "http-client")]
fn http_transport(config: &CourierConfig) -> RuntimeResult<(BoxedBot, BoxedSource)> {
    use std::sync::Arc;

    use courier_transport::TelegramClient;

    if config.bot.token.is_empty() {
        return Err(RuntimeError::MissingToken);
    }

    let client = Arc::new(
        TelegramClient::builder(&config.bot.token)
            .api_url(&config.bot.api_url)
            .request_timeout(config.bot.request_timeout())
            .allowed_updates(config.polling.allowed_updates.clone())
            .limit(config.polling.limit)
            .build()?,
    );
    info!(client = ?client, "HTTP transport ready");

    let bot: BoxedBot = client.clone();
    let source: BoxedSource = client;
    Ok((bot, source))
}

#[cfg(not(feature = "http-client"))]
fn http_transport(_config: &CourierConfig) -> RuntimeResult<(BoxedBot, BoxedSource)> {
    Err(RuntimeError::NoTransport)
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            // Without a signal handler only the shutdown token can stop us.
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`CourierRuntime`] with custom configuration.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn without_dotenv(mut self) -> Self {
        self.config_loader = self.config_loader.without_dotenv();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> ConfigResult<CourierRuntime> {
        let config = self.config_loader.load()?;
        Ok(CourierRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
