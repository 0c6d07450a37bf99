//! Backpressure for the writer queue.
//!
//! Tracks how many outbound items are queued for the writer task but not yet
//! handed to the transport. When the count reaches `max_pending`, senders
//! wait until the writer drains a batch, up to a timeout.
//!
//! # Configuration
//!
//! - `max_pending`: Maximum number of queued items (default: 1024)
//! - Timeout: How long a sender waits for space (default: 5s)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{ClientError, Result};

/// Default maximum pending items before backpressure kicks in.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Shared {
    pending: AtomicUsize,
    released: Notify,
}

/// Counter of queued items shared between senders and the writer task.
///
/// Clones share the same counter.
#[derive(Debug, Clone)]
pub struct BackpressureController {
    shared: Arc<Shared>,
    max_pending: usize,
    timeout: Duration,
}

impl BackpressureController {
    /// Create a controller with the given limit and timeout.
    pub fn new(max_pending: usize, timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            max_pending: max_pending.max(1),
            timeout,
        }
    }

    /// Check if backpressure is currently active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.pending_count() >= self.max_pending
    }

    /// Get current pending count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Get maximum pending limit.
    #[inline]
    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    /// Try to reserve a slot without waiting.
    ///
    /// Returns `Err(BackpressureTimeout)` if at capacity.
    pub fn try_reserve(&self) -> Result<()> {
        if self.acquire_slot() {
            Ok(())
        } else {
            Err(ClientError::BackpressureTimeout)
        }
    }

    /// Reserve a slot, waiting up to the timeout for one to free up.
    pub async fn reserve(&self) -> Result<()> {
        if self.acquire_slot() {
            return Ok(());
        }

        let wait = async {
            loop {
                // Created before the check so a release in between is not lost.
                let released = self.shared.released.notified();
                if self.acquire_slot() {
                    return;
                }
                released.await;
            }
        };

        tokio::time::timeout(self.timeout, wait)
            .await
            .map_err(|_| ClientError::BackpressureTimeout)
    }

    /// Release `count` slots (called after a batch is handed to the transport).
    pub fn release_many(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.shared.pending.fetch_sub(count, Ordering::AcqRel);
        self.shared.released.notify_waiters();
    }

    fn acquire_slot(&self) -> bool {
        let max = self.max_pending;
        self.shared
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .is_ok()
    }
}

impl Default for BackpressureController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING, DEFAULT_TIMEOUT)
    }
}
