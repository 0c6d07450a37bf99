//! Correlation registry mapping `(remote endpoint, token)` to callbacks.
//!
//! The registry is shared by the send path (inserts) and the receive path
//! (lookups and removals). Every operation runs under one mutex covering the
//! whole table, so a lookup followed by a conditional removal is atomic when
//! done through [`CorrelationRegistry::resolve`].
//!
//! # Example
//!
//! ```ignore
//! let registry = CorrelationRegistry::new();
//!
//! registry.insert(remote, token.clone(), Callback::plain(cb));
//! let resolved = registry.resolve(remote, &token, |cb| !cb.is_observing());
//! assert!(resolved.unwrap().removed);
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;

use parking_lot::Mutex;

use super::Callback;
use crate::protocol::Token;

/// Outcome of [`CorrelationRegistry::resolve`].
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The registered callback.
    pub callback: Callback,
    /// Whether the registration was removed.
    pub removed: bool,
}

/// Table of pending callbacks keyed by `(remote endpoint, token)`.
pub struct CorrelationRegistry {
    callbacks: Mutex<HashMap<(SocketAddr, Token), Callback>>,
}

impl CorrelationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a callback.
    ///
    /// Returns the callback previously registered under the same key, if
    /// any. The caller owns the displaced callback and must fail it.
    pub fn insert(&self, remote: SocketAddr, token: Token, callback: Callback) -> Option<Callback> {
        let mut callbacks = self.callbacks.lock();
        let previous = callbacks.insert((remote, token.clone()), callback);

        if previous.is_some() {
            tracing::error!("Tried to use token {} for {} twice!", token, remote);
        } else {
            tracing::debug!("Added callback for token {} from {}", token, remote);
        }

        previous
    }

    /// Look up a callback without removing it.
    pub fn get(&self, remote: SocketAddr, token: &Token) -> Option<Callback> {
        self.callbacks
            .lock()
            .get(&(remote, token.clone()))
            .cloned()
    }

    /// Remove a registration, returning its callback.
    pub fn remove(&self, remote: SocketAddr, token: &Token) -> Option<Callback> {
        let mut callbacks = self.callbacks.lock();
        let removed = callbacks.remove(&(remote, token.clone()));

        if removed.is_some() {
            tracing::debug!("Removed callback for token {} from {}", token, remote);
        }
        tracing::debug!("Number of callbacks waiting for response: {}", callbacks.len());

        removed
    }

    /// Look up a callback and remove it if `is_terminal` says so.
    ///
    /// Lookup and removal happen under the same lock, so no other thread can
    /// touch the key in between.
    pub fn resolve<F>(&self, remote: SocketAddr, token: &Token, is_terminal: F) -> Option<Resolved>
    where
        F: FnOnce(&Callback) -> bool,
    {
        let mut callbacks = self.callbacks.lock();
        let key = (remote, token.clone());

        let terminal = is_terminal(callbacks.get(&key)?);
        let resolved = if terminal {
            let callback = callbacks.remove(&key)?;
            tracing::debug!("Removed callback for token {} from {}", token, remote);
            Resolved {
                callback,
                removed: true,
            }
        } else {
            Resolved {
                callback: callbacks.get(&key)?.clone(),
                removed: false,
            }
        };

        Some(resolved)
    }

    /// Check if a registration exists.
    ///
    /// Diagnostic only: the answer may be stale by the time it is used.
    pub fn contains(&self, remote: SocketAddr, token: &Token) -> bool {
        self.callbacks.lock().contains_key(&(remote, token.clone()))
    }

    /// Drop every registration, returning how many there were.
    ///
    /// Callbacks are not notified.
    pub fn clear(&self) -> usize {
        let mut callbacks = self.callbacks.lock();
        let count = callbacks.len();
        callbacks.clear();
        count
    }

    /// Number of live registrations (diagnostic).
    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Whether the registry is empty (diagnostic).
    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
