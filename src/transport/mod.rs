//! Transport module - the boundary to the datagram layer below.
//!
//! The correlation layer does not encode messages or handle retransmission.
//! It hands requests and control events to a [`Transport`] from a single
//! writer task, and receives [`Inbound`](crate::protocol::Inbound) items on
//! a channel.
//!
//! - [`ChannelTransport`] - forwards everything into an mpsc channel, for
//!   embedding behind a separate codec task and for tests

mod channel;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

use crate::protocol::{ControlEvent, Request};

pub use channel::{ChannelTransport, Transmission};

/// Boxed future returned by transport methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outbound side of the datagram layer.
///
/// Only the writer task calls these methods, one at a time.
pub trait Transport: Send + 'static {
    /// Send a request to `remote`.
    ///
    /// The returned future resolves once the transport has accepted or
    /// rejected the message.
    fn transmit(&mut self, request: Request, remote: SocketAddr) -> BoxFuture<'_, io::Result<()>>;

    /// Apply a control event (observation cancellation, reset).
    fn control(&mut self, event: ControlEvent) -> BoxFuture<'_, io::Result<()>>;
}
