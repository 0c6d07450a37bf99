//! Dispatch module - the send and receive paths around the registry.
//!
//! The [`Dispatcher`] owns the correlation registry and is shared by:
//! - callers sending requests ([`Dispatcher::send`], in `outbound`)
//! - the read loop handing over inbound items ([`Dispatcher::handle_inbound`],
//!   in `inbound`)
//! - completion observers rolling back failed transmissions
//!
//! The registry is the only state the two paths share.

mod inbound;
mod outbound;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::handler::{Callback, CorrelationRegistry};
use crate::protocol::Token;
use crate::scheduler::DeferredScheduler;
use crate::token::TokenAllocator;
use crate::writer::WriterHandle;

/// Behavior switches for the dispatch paths.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Release the token when a transmission fails after registration.
    ///
    /// Default: true
    pub release_token_on_transmit_failure: bool,
    /// Emit an observation cancellation for every response to an observing
    /// callback, not only the one that ends the observation.
    ///
    /// Default: true
    pub cancel_on_every_notification: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            release_token_on_transmit_failure: true,
            cancel_on_every_notification: true,
        }
    }
}

/// Result of [`Dispatcher::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The request was registered under this token and queued.
    Registered(Token),
    /// The endpoint has no free token; the callback was told so.
    NoTokenAvailable,
    /// An observation cancellation was queued without registration.
    CancellationForwarded,
}

/// Correlation engine shared by both dispatch paths.
pub struct Dispatcher {
    registry: Arc<CorrelationRegistry>,
    tokens: Arc<dyn TokenAllocator>,
    writer: WriterHandle,
    scheduler: DeferredScheduler,
    config: DispatchConfig,
    shut_down: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher with an empty registry.
    pub fn new(
        tokens: Arc<dyn TokenAllocator>,
        writer: WriterHandle,
        scheduler: DeferredScheduler,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry: Arc::new(CorrelationRegistry::new()),
            tokens,
            writer,
            scheduler,
            config,
            shut_down: AtomicBool::new(false),
        }
    }

    /// The correlation registry.
    #[inline]
    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// The writer handle.
    #[inline]
    pub fn writer(&self) -> &WriterHandle {
        &self.writer
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Drop every pending registration.
    ///
    /// Tokens are not released and callbacks are not notified. Only the first
    /// call has an effect; it returns `true`.
    pub fn shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return false;
        }

        let dropped = self.registry.clear();
        tracing::info!("Shutdown: dropped {} pending callbacks", dropped);
        true
    }
}

/// Remove the registration of `callback` and release its token.
///
/// Leaves the key alone if it has been taken over by another callback in the
/// meantime. Returns whether a registration was removed.
fn roll_back(
    registry: &CorrelationRegistry,
    tokens: &dyn TokenAllocator,
    remote: SocketAddr,
    token: &Token,
    callback: &Callback,
    release: bool,
) -> bool {
    let removed = registry
        .resolve(remote, token, |registered| registered.same_callback(callback))
        .is_some_and(|resolved| resolved.removed);

    if removed && release {
        tokens.release(remote, token);
    }
    removed
}
