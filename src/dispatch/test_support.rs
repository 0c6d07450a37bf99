//! Shared fixtures for dispatcher tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{DispatchConfig, Dispatcher};
use crate::backpressure::BackpressureController;
use crate::handler::ClientCallback;
use crate::protocol::{ExchangeEvent, Response, Token};
use crate::scheduler::DeferredScheduler;
use crate::token::TokenAllocator;
use crate::writer::{Outbound, WriterHandle};

pub fn remote() -> SocketAddr {
    "10.0.0.5:5683".parse().unwrap()
}

/// Callback recording everything it receives.
#[derive(Default)]
pub struct Recorder {
    pub responses: Mutex<Vec<Response>>,
    pub events: Mutex<Vec<ExchangeEvent>>,
}

impl Recorder {
    pub fn response_count(&self) -> usize {
        self.responses.lock().len()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl ClientCallback for Recorder {
    fn on_response(&self, response: &Response) {
        self.responses.lock().push(response.clone());
    }

    fn on_exchange_event(&self, event: &ExchangeEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Allocator handing out scripted tokens and logging releases.
#[derive(Default)]
pub struct ScriptedTokens {
    pub next: Mutex<Vec<Option<Token>>>,
    pub released: Mutex<Vec<(SocketAddr, Token)>>,
}

impl ScriptedTokens {
    pub fn with(tokens: Vec<Option<Token>>) -> Arc<Self> {
        let mut tokens = tokens;
        tokens.reverse();
        Arc::new(Self {
            next: Mutex::new(tokens),
            released: Mutex::new(Vec::new()),
        })
    }

    pub fn releases_of(&self, token: &Token) -> usize {
        self.released
            .lock()
            .iter()
            .filter(|(_, t)| t == token)
            .count()
    }

    pub fn release_count(&self) -> usize {
        self.released.lock().len()
    }
}

impl TokenAllocator for ScriptedTokens {
    fn allocate(&self, _remote: SocketAddr) -> Option<Token> {
        self.next.lock().pop().flatten()
    }

    fn release(&self, remote: SocketAddr, token: &Token) {
        self.released.lock().push((remote, token.clone()));
    }
}

/// Dispatcher whose writer queue is read directly by the test.
pub struct Harness {
    pub dispatcher: Dispatcher,
    pub tokens: Arc<ScriptedTokens>,
    pub queue: mpsc::Receiver<Outbound>,
}

impl Harness {
    pub fn new(tokens: Vec<Option<Token>>) -> Self {
        Self::with_config(tokens, DispatchConfig::default())
    }

    pub fn with_config(tokens: Vec<Option<Token>>, config: DispatchConfig) -> Self {
        let tokens = ScriptedTokens::with(tokens);
        let (tx, queue) = mpsc::channel(64);
        let writer = WriterHandle::new(tx, BackpressureController::default());
        let scheduler = DeferredScheduler::current().unwrap();
        let dispatcher = Dispatcher::new(tokens.clone(), writer, scheduler, config);

        Self {
            dispatcher,
            tokens,
            queue,
        }
    }

    /// Next queued item, failing the test after a second.
    pub async fn next_item(&mut self) -> Outbound {
        tokio::time::timeout(Duration::from_secs(1), self.queue.recv())
            .await
            .expect("timed out waiting for writer item")
            .expect("writer queue closed")
    }

    /// Give spawned tasks a chance to run, then drain the queue.
    pub async fn drain(&mut self) -> Vec<Outbound> {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let mut items = Vec::new();
        while let Ok(item) = self.queue.try_recv() {
            items.push(item);
        }
        items
    }
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
