//! Handler module - callbacks and the correlation registry.
//!
//! Provides:
//! - [`ClientCallback`] - caller-supplied receiver of responses and events
//! - [`Callback`] - a callback tagged as plain or observing
//! - [`CorrelationRegistry`] - maps `(remote endpoint, token)` to callbacks

mod callback;
mod registry;

pub use callback::{Callback, ClientCallback};
pub use registry::{CorrelationRegistry, Resolved};
