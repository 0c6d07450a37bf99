//! Sequential per-endpoint token allocator.
//!
//! Each endpoint gets its own counter and in-use set. Tokens are the minimal
//! big-endian encoding of the counter value, so the first tokens towards a
//! fresh endpoint are one byte long. The counter wraps within the space
//! allowed by `max_token_length` and skips values still in use.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use parking_lot::Mutex;

use super::TokenAllocator;
use crate::protocol::{Token, MAX_TOKEN_LENGTH};

/// Default maximum token length in bytes.
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = MAX_TOKEN_LENGTH;

/// Default maximum number of tokens in flight per endpoint.
pub const DEFAULT_MAX_TOKENS_PER_ENDPOINT: usize = 65_536;

#[derive(Debug)]
struct EndpointTokens {
    next: u64,
    in_use: HashSet<Token>,
}

/// Default [`TokenAllocator`].
#[derive(Debug)]
pub struct TokenFactory {
    /// Highest counter value that fits into `max_token_length` bytes.
    max_value: u64,
    /// Cap on concurrently allocated tokens per endpoint.
    max_in_flight: usize,
    endpoints: Mutex<HashMap<SocketAddr, EndpointTokens>>,
}

impl TokenFactory {
    /// Create a factory.
    ///
    /// `max_token_length` is clamped to 1..=8 bytes, `max_in_flight` to at
    /// least 1.
    pub fn new(max_token_length: usize, max_in_flight: usize) -> Self {
        let len = max_token_length.clamp(1, MAX_TOKEN_LENGTH);
        let max_value = if len == MAX_TOKEN_LENGTH {
            u64::MAX
        } else {
            (1u64 << (8 * len)) - 1
        };

        Self {
            max_value,
            max_in_flight: max_in_flight.max(1),
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    /// Number of tokens currently in flight towards `remote`.
    pub fn in_flight(&self, remote: SocketAddr) -> usize {
        self.endpoints
            .lock()
            .get(&remote)
            .map_or(0, |e| e.in_use.len())
    }

    /// Number of endpoints with at least one token in flight.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.lock().len()
    }

    fn capacity(&self) -> u64 {
        self.max_value.min(self.max_in_flight as u64)
    }
}

impl Default for TokenFactory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKEN_LENGTH, DEFAULT_MAX_TOKENS_PER_ENDPOINT)
    }
}

impl TokenAllocator for TokenFactory {
    fn allocate(&self, remote: SocketAddr) -> Option<Token> {
        let capacity = self.capacity();
        let mut endpoints = self.endpoints.lock();
        let entry = endpoints.entry(remote).or_insert_with(|| EndpointTokens {
            next: 1,
            in_use: HashSet::new(),
        });

        if entry.in_use.len() as u64 >= capacity {
            tracing::debug!(
                "No token available for {} ({} in flight)",
                remote,
                entry.in_use.len()
            );
            return None;
        }

        // Value 0 (the empty token) is never handed out. A free value exists
        // because in_use.len() < capacity <= max_value.
        loop {
            let candidate = entry.next;
            entry.next = if candidate >= self.max_value {
                1
            } else {
                candidate + 1
            };

            let token = Token::from_u64(candidate);
            if entry.in_use.insert(token.clone()) {
                return Some(token);
            }
        }
    }

    fn release(&self, remote: SocketAddr, token: &Token) {
        let mut endpoints = self.endpoints.lock();
        let Some(entry) = endpoints.get_mut(&remote) else {
            tracing::debug!("Release of token {} for unknown endpoint {}", token, remote);
            return;
        };

        if !entry.in_use.remove(token) {
            tracing::debug!("Token {} for {} was not in use", token, remote);
        }

        if entry.in_use.is_empty() {
            endpoints.remove(&remote);
        }
    }
}
