//! Deferred event scheduler.
//!
//! Posts work to a later turn of the tokio runtime instead of running it on
//! the current call stack. The dispatch paths use it to emit observation
//! cancellations while they are in the middle of handling another message.

use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{ClientError, Result};
use crate::protocol::ControlEvent;
use crate::writer::WriterHandle;

/// Runs tasks on a tokio runtime, never inline.
#[derive(Debug, Clone)]
pub struct DeferredScheduler {
    handle: Handle,
}

impl DeferredScheduler {
    /// Schedule onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime the caller is running on.
    ///
    /// Fails with `NoRuntime` outside a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| ClientError::NoRuntime)
    }

    /// Run `task` on a later turn.
    pub fn schedule<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(task)
    }

    /// Queue `event` to the writer on a later turn.
    pub fn emit_control(&self, writer: &WriterHandle, event: ControlEvent) -> JoinHandle<()> {
        let writer = writer.clone();
        self.schedule(async move {
            tracing::debug!("Emit deferred control event {:?}", event);
            if let Err(e) = writer.control(event).await {
                tracing::warn!("Could not queue deferred control event: {}", e);
            }
        })
    }
}
