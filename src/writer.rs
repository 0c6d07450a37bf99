//! Dedicated writer task feeding the transport.
//!
//! Every outbound request and control event goes through one mpsc channel to
//! a single task that owns the [`Transport`]. Senders never call into the
//! transport themselves, so a write can never re-enter another write.
//!
//! # Architecture
//!
//! ```text
//! Client::send ──────┐
//! Receive path ──────┼─► mpsc::Sender<Outbound> ─► Writer Task ─► Transport
//! Deferred events ───┘
//! ```
//!
//! Each request may carry a completion channel; the writer reports the
//! transport's verdict on it so the send path can roll back failed
//! registrations.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::backpressure::BackpressureController;
use crate::error::{ClientError, Result};
use crate::protocol::{ControlEvent, Request};
use crate::transport::Transport;

/// Default maximum queued items before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_MESSAGES: usize = 1024;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum items drained from the channel per batch.
const MAX_BATCH_SIZE: usize = 64;

/// Receiver of a request's transmission outcome.
pub type Completion = oneshot::Receiver<io::Result<()>>;

/// An item queued for the writer task.
#[derive(Debug)]
pub enum Outbound {
    /// A request for `remote`.
    Message {
        /// The request to transmit.
        request: Request,
        /// Destination.
        remote: SocketAddr,
        /// Where to report the transmission outcome.
        completion: Option<oneshot::Sender<io::Result<()>>>,
    },
    /// A control event.
    Control(ControlEvent),
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum queued items before backpressure kicks in.
    pub max_pending_messages: usize,
    /// Channel capacity for the item queue.
    pub channel_capacity: usize,
    /// Timeout when waiting for backpressure to clear.
    pub backpressure_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_messages: DEFAULT_MAX_PENDING_MESSAGES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

/// Handle for queueing items to the writer task.
///
/// Cheaply cloneable; shared by both dispatch paths.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Outbound>,
    backpressure: BackpressureController,
}

impl WriterHandle {
    pub(crate) fn new(tx: mpsc::Sender<Outbound>, backpressure: BackpressureController) -> Self {
        Self { tx, backpressure }
    }

    /// Queue an item, waiting if backpressure is active.
    pub async fn send(&self, item: Outbound) -> Result<()> {
        self.backpressure.reserve().await?;

        self.tx.send(item).await.map_err(|_| {
            self.backpressure.release_many(1);
            ClientError::TransportClosed
        })
    }

    /// Queue an item without waiting.
    ///
    /// Returns `Err(BackpressureTimeout)` immediately if at capacity.
    pub fn try_send(&self, item: Outbound) -> Result<()> {
        self.backpressure.try_reserve()?;

        self.tx.try_send(item).map_err(|e| {
            self.backpressure.release_many(1);
            match e {
                mpsc::error::TrySendError::Full(_) => ClientError::BackpressureTimeout,
                mpsc::error::TrySendError::Closed(_) => ClientError::TransportClosed,
            }
        })
    }

    /// Queue a request and get a receiver for its transmission outcome.
    pub async fn transmit(&self, request: Request, remote: SocketAddr) -> Result<Completion> {
        let (completion, rx) = oneshot::channel();
        self.send(Outbound::Message {
            request,
            remote,
            completion: Some(completion),
        })
        .await?;
        Ok(rx)
    }

    /// Queue a request without tracking its outcome.
    pub async fn forward(&self, request: Request, remote: SocketAddr) -> Result<()> {
        self.send(Outbound::Message {
            request,
            remote,
            completion: None,
        })
        .await
    }

    /// Queue a control event.
    pub async fn control(&self, event: ControlEvent) -> Result<()> {
        self.send(Outbound::Control(event)).await
    }

    /// Check if backpressure is currently active.
    #[inline]
    pub fn is_backpressure_active(&self) -> bool {
        self.backpressure.is_active()
    }

    /// Get current queued item count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.backpressure.pending_count()
    }

    /// Check if the writer task has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for queueing items.
///
/// The task ends once every [`WriterHandle`] is dropped.
pub fn spawn_writer_task<T>(transport: T, config: WriterConfig) -> (WriterHandle, JoinHandle<()>)
where
    T: Transport,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let backpressure =
        BackpressureController::new(config.max_pending_messages, config.backpressure_timeout);

    let handle = WriterHandle::new(tx, backpressure.clone());
    let task = tokio::spawn(writer_loop(rx, transport, backpressure));

    (handle, task)
}

/// Spawn the writer task with default configuration.
pub fn spawn_writer_task_default<T>(transport: T) -> (WriterHandle, JoinHandle<()>)
where
    T: Transport,
{
    spawn_writer_task(transport, WriterConfig::default())
}

/// Main writer loop - drains the queue in batches and drives the transport.
async fn writer_loop<T>(
    mut rx: mpsc::Receiver<Outbound>,
    mut transport: T,
    backpressure: BackpressureController,
) where
    T: Transport,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    loop {
        let first = match rx.recv().await {
            Some(item) => item,
            None => {
                tracing::debug!("Writer channel closed, stopping writer task");
                return;
            }
        };

        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(item) => batch.push(item),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        write_batch(&mut transport, batch.drain(..)).await;
        backpressure.release_many(batch_size);
    }
}

/// Hand a batch to the transport in queue order.
///
/// Transport errors are per item: they are reported on the item's completion
/// channel (or logged) and never stop the loop.
async fn write_batch<T, I>(transport: &mut T, batch: I)
where
    T: Transport,
    I: IntoIterator<Item = Outbound>,
{
    for item in batch {
        match item {
            Outbound::Message {
                request,
                remote,
                completion,
            } => {
                let token = request.token.clone();
                let result = transport.transmit(request, remote).await;

                match completion {
                    Some(completion) => {
                        // Receiver gone means nobody is tracking this request.
                        let _ = completion.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            tracing::error!(
                                "Could not write request (remote: {}, token: {}): {}",
                                remote,
                                token,
                                e
                            );
                        }
                    }
                }
            }
            Outbound::Control(event) => {
                if let Err(e) = transport.control(event.clone()).await {
                    tracing::error!("Could not write control event {:?}: {}", event, e);
                }
            }
        }
    }
}
