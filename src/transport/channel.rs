//! In-memory transport backed by an mpsc channel.
//!
//! # Example
//!
//! ```ignore
//! let (transport, mut wire) = ChannelTransport::new(64);
//! let client = Client::builder().start(transport, inbound_rx)?;
//!
//! while let Some(transmission) = wire.recv().await {
//!     // encode and send, or inspect in a test
//! }
//! ```

use std::io;
use std::net::SocketAddr;

use tokio::sync::mpsc;

use super::{BoxFuture, Transport};
use crate::protocol::{ControlEvent, Request};

/// Item written by a [`ChannelTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum Transmission {
    /// A request to send.
    Request {
        /// The request, token already set.
        request: Request,
        /// Destination.
        remote: SocketAddr,
    },
    /// A control event.
    Control(ControlEvent),
}

/// Transport that forwards every item into a channel.
///
/// Transmission fails with `BrokenPipe` once the receiving side is dropped.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Transmission>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its items arrive on.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Transmission>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    async fn forward(&self, transmission: Transmission) -> io::Result<()> {
        self.tx.send(transmission).await.map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "transport receiver dropped")
        })
    }
}

impl Transport for ChannelTransport {
    fn transmit(&mut self, request: Request, remote: SocketAddr) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(self.forward(Transmission::Request { request, remote }))
    }

    fn control(&mut self, event: ControlEvent) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(self.forward(Transmission::Control(event)))
    }
}
