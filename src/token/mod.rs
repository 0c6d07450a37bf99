//! Token allocation.
//!
//! The dispatcher asks a [`TokenAllocator`] for a fresh token per outbound
//! request and hands it back once the registration using it is gone.
//! [`TokenFactory`] is the default sequential allocator.

mod factory;

use std::net::SocketAddr;

use crate::protocol::Token;

pub use factory::{TokenFactory, DEFAULT_MAX_TOKENS_PER_ENDPOINT, DEFAULT_MAX_TOKEN_LENGTH};

/// Source of per-endpoint correlation tokens.
pub trait TokenAllocator: Send + Sync + 'static {
    /// Allocate a token not currently in flight towards `remote`.
    ///
    /// Returns `None` when the endpoint's token space is exhausted.
    fn allocate(&self, remote: SocketAddr) -> Option<Token>;

    /// Return a token to the pool.
    ///
    /// Releasing a token that is not in flight must be harmless.
    fn release(&self, remote: SocketAddr, token: &Token);
}
