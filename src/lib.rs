//! # coapwire-client
//!
//! Client-side transaction correlation for CoAP-style request/response
//! protocols over unreliable, connectionless transports.
//!
//! Every outbound request gets a per-endpoint token and a registered
//! callback. Inbound responses and exchange events are matched back to that
//! callback by `(remote endpoint, token)`, and observations stay registered
//! across update notifications until they end.
//!
//! ## Architecture
//!
//! - **Send path**: token allocation, registration, hand-off to the writer task
//! - **Receive path**: registry resolution, observation lifecycle, resets for
//!   uncorrelated responses
//! - **Transport**: message encoding, retransmission and the socket live
//!   behind the [`transport::Transport`] trait and the inbound channel
//!
//! ## Example
//!
//! ```ignore
//! use coapwire_client::{Client, Request};
//! use coapwire_client::transport::ChannelTransport;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (transport, wire) = ChannelTransport::new(64);
//!     let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(64);
//!
//!     let client = Client::builder().start(transport, inbound_rx).unwrap();
//!     client
//!         .request(Request::get("/temp"), remote, Arc::new(PrintCallback))
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod scheduler;
pub mod token;
pub mod transport;
pub mod writer;

mod backpressure;
mod client;

pub use client::{Client, ClientBuilder};
pub use dispatch::{DispatchConfig, SendOutcome};
pub use error::{ClientError, Result};
pub use handler::{Callback, ClientCallback};
pub use protocol::{ExchangeEvent, ExchangeEventKind, Inbound, Request, Response, Token};
