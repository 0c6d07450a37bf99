//! Client builder and runtime loop.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring the writer,
//! token allocation and dispatch behavior. The [`Client`] manages the
//! lifecycle:
//! 1. Spawn the writer task around the transport
//! 2. Spawn the read loop over the inbound channel
//! 3. Correlate requests and responses until shutdown
//!
//! # Example
//!
//! ```ignore
//! use coapwire_client::{Client, Request};
//! use coapwire_client::transport::ChannelTransport;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (transport, wire) = ChannelTransport::new(64);
//!     let (inbound_tx, inbound_rx) = mpsc::channel(64);
//!
//!     let client = Client::builder()
//!         .max_tokens_per_endpoint(256)
//!         .start(transport, inbound_rx)?;
//!
//!     client
//!         .observe(Request::get("/sensors/temp"), remote, Arc::new(MyCallback))
//!         .await?;
//!
//!     client.wait_for_shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;

use crate::dispatch::{DispatchConfig, Dispatcher, SendOutcome};
use crate::error::Result;
use crate::handler::{Callback, ClientCallback, CorrelationRegistry};
use crate::protocol::{Inbound, Request};
use crate::scheduler::DeferredScheduler;
use crate::token::{
    TokenAllocator, TokenFactory, DEFAULT_MAX_TOKENS_PER_ENDPOINT, DEFAULT_MAX_TOKEN_LENGTH,
};
use crate::transport::Transport;
use crate::writer::{spawn_writer_task, WriterConfig};

/// Builder for configuring and creating a client.
///
/// Use the fluent API to adjust limits, then call `start()` with a transport
/// and the channel inbound traffic arrives on.
pub struct ClientBuilder {
    writer_config: WriterConfig,
    dispatch_config: DispatchConfig,
    max_token_length: usize,
    max_tokens_per_endpoint: usize,
    token_allocator: Option<Arc<dyn TokenAllocator>>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            writer_config: WriterConfig::default(),
            dispatch_config: DispatchConfig::default(),
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
            max_tokens_per_endpoint: DEFAULT_MAX_TOKENS_PER_ENDPOINT,
            token_allocator: None,
        }
    }

    /// Set the maximum queued messages for backpressure.
    ///
    /// When this limit is reached, sends wait until backpressure clears or
    /// time out.
    /// Default: 1024
    pub fn max_pending_messages(mut self, limit: usize) -> Self {
        self.writer_config.max_pending_messages = limit;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.writer_config.channel_capacity = capacity;
        self
    }

    /// Set the backpressure timeout.
    ///
    /// Default: 5 seconds
    pub fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.writer_config.backpressure_timeout = timeout;
        self
    }

    /// Set the maximum token length in bytes (1-8).
    ///
    /// Ignored when a custom allocator is set.
    /// Default: 8
    pub fn max_token_length(mut self, len: usize) -> Self {
        self.max_token_length = len;
        self
    }

    /// Set the maximum number of tokens in flight per endpoint.
    ///
    /// Ignored when a custom allocator is set.
    /// Default: 65536
    pub fn max_tokens_per_endpoint(mut self, limit: usize) -> Self {
        self.max_tokens_per_endpoint = limit;
        self
    }

    /// Use a custom token allocator instead of [`TokenFactory`].
    pub fn token_allocator(mut self, allocator: Arc<dyn TokenAllocator>) -> Self {
        self.token_allocator = Some(allocator);
        self
    }

    /// Release the token when a transmission fails after registration.
    ///
    /// Default: true
    pub fn release_token_on_transmit_failure(mut self, release: bool) -> Self {
        self.dispatch_config.release_token_on_transmit_failure = release;
        self
    }

    /// Emit an observation cancellation for every response to an observation,
    /// not only the one ending it.
    ///
    /// Default: true
    pub fn cancel_on_every_notification(mut self, cancel: bool) -> Self {
        self.dispatch_config.cancel_on_every_notification = cancel;
        self
    }

    /// Build and start the client.
    ///
    /// This will:
    /// 1. Spawn the writer task owning `transport`
    /// 2. Spawn the read loop draining `inbound`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<T: Transport>(self, transport: T, inbound: mpsc::Receiver<Inbound>) -> Result<Client> {
        let scheduler = DeferredScheduler::current()?;
        let tokens = self.token_allocator.unwrap_or_else(|| {
            Arc::new(TokenFactory::new(
                self.max_token_length,
                self.max_tokens_per_endpoint,
            ))
        });

        Client::start(
            transport,
            inbound,
            tokens,
            scheduler,
            self.writer_config,
            self.dispatch_config,
        )
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running client.
///
/// Use `request()` for one-shot exchanges, `observe()` for observations and
/// `shutdown()` to drop every pending registration.
pub struct Client {
    dispatcher: Arc<Dispatcher>,
    /// Wakes the read loop on shutdown.
    stop: Arc<Notify>,
    /// Fires when the read loop has ended.
    shutdown_rx: oneshot::Receiver<()>,
    _writer_task: JoinHandle<()>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    fn start<T: Transport>(
        transport: T,
        inbound: mpsc::Receiver<Inbound>,
        tokens: Arc<dyn TokenAllocator>,
        scheduler: DeferredScheduler,
        writer_config: WriterConfig,
        dispatch_config: DispatchConfig,
    ) -> Result<Self> {
        let (writer, writer_task) = spawn_writer_task(transport, writer_config);
        let dispatcher = Arc::new(Dispatcher::new(tokens, writer, scheduler, dispatch_config));

        let stop = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let dispatcher_clone = dispatcher.clone();
        let stop_clone = stop.clone();
        tokio::spawn(async move {
            Self::read_loop(inbound, dispatcher_clone, stop_clone).await;
            let _ = shutdown_tx.send(());
        });

        tracing::debug!("Client started");

        Ok(Client {
            dispatcher,
            stop,
            shutdown_rx,
            _writer_task: writer_task,
        })
    }

    /// Main read loop - hands inbound items to the dispatcher.
    ///
    /// Ends when the inbound channel closes or the client shuts down.
    async fn read_loop(
        mut inbound: mpsc::Receiver<Inbound>,
        dispatcher: Arc<Dispatcher>,
        stop: Arc<Notify>,
    ) {
        loop {
            if dispatcher.is_shut_down() {
                break;
            }

            tokio::select! {
                _ = stop.notified() => break,
                item = inbound.recv() => match item {
                    Some(item) => dispatcher.handle_inbound(item).await,
                    None => {
                        tracing::debug!("Inbound channel closed");
                        break;
                    }
                },
            }
        }
        tracing::debug!("Read loop finished");
    }

    /// Send `request` to `remote`, routing its outcome to `callback`.
    pub async fn send(
        &self,
        request: Request,
        remote: SocketAddr,
        callback: Callback,
    ) -> Result<SendOutcome> {
        self.dispatcher.send(request, remote, callback).await
    }

    /// Send a one-shot request.
    ///
    /// `callback` receives at most one response.
    pub async fn request(
        &self,
        request: Request,
        remote: SocketAddr,
        callback: Arc<dyn ClientCallback>,
    ) -> Result<SendOutcome> {
        self.send(request, remote, Callback::plain(callback)).await
    }

    /// Start observing the resource addressed by `request`.
    ///
    /// The request is marked as an observation registration. `callback`
    /// receives every update notification until the observation ends.
    pub async fn observe(
        &self,
        request: Request,
        remote: SocketAddr,
        callback: Arc<dyn ClientCallback>,
    ) -> Result<SendOutcome> {
        let request = request.with_observe_registration();
        self.send(request, remote, Callback::observing(callback))
            .await
    }

    /// Drop every pending registration and stop the read loop.
    ///
    /// Tokens are not released and callbacks are not notified. Only the first
    /// call has an effect.
    pub fn shutdown(&self) {
        if self.dispatcher.shutdown() {
            self.stop.notify_one();
        }
    }

    /// Check whether the client has been shut down.
    pub fn is_shut_down(&self) -> bool {
        self.dispatcher.is_shut_down()
    }

    /// Number of pending registrations.
    pub fn pending_registrations(&self) -> usize {
        self.dispatcher.registry().len()
    }

    /// The correlation registry, for diagnostics.
    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        self.dispatcher.registry()
    }

    /// Get the current backpressure status.
    pub fn is_backpressure_active(&self) -> bool {
        self.dispatcher.writer().is_backpressure_active()
    }

    /// Get the current queued message count.
    pub fn pending_messages(&self) -> usize {
        self.dispatcher.writer().pending_count()
    }

    /// Wait for the read loop to end (inbound channel closed or shutdown).
    ///
    /// This consumes the client.
    pub async fn wait_for_shutdown(self) -> Result<()> {
        let _ = self.shutdown_rx.await;
        Ok(())
    }
}
