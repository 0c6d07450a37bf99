//! Send path: token allocation, registration and hand-off to the writer.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;

use super::{roll_back, Dispatcher, SendOutcome};
use crate::error::{ClientError, Result};
use crate::handler::Callback;
use crate::protocol::{ControlEvent, ExchangeEvent, ExchangeEventKind, Request, Token};
use crate::writer::Completion;

impl Dispatcher {
    /// Register `callback` for `request` and queue the request for `remote`.
    ///
    /// - A request cancelling an observation is forwarded with its own token,
    ///   without registration, and a deferred `ObservationCancelled` is
    ///   emitted.
    /// - If `remote` has no free token, the callback receives a
    ///   `NoTokenAvailable` event before this returns and nothing is sent.
    /// - Otherwise the request gets a fresh token, the callback is registered
    ///   under it and the request is queued. A failed transmission later
    ///   removes the registration again.
    ///
    /// Returns `Err` only if the request could not be queued at all; the
    /// registration is rolled back in that case.
    pub async fn send(
        &self,
        mut request: Request,
        remote: SocketAddr,
        callback: Callback,
    ) -> Result<SendOutcome> {
        if self.is_shut_down() {
            return Err(ClientError::ShutDown);
        }

        if request.is_observation_cancellation() {
            let token = request.token.clone();
            tracing::debug!(
                "Forward observation cancellation for token {} to {}",
                token,
                remote
            );
            self.scheduler.emit_control(
                &self.writer,
                ControlEvent::ObservationCancelled { remote, token },
            );
            self.writer.forward(request, remote).await?;
            return Ok(SendOutcome::CancellationForwarded);
        }

        let Some(token) = self.tokens.allocate(remote) else {
            tracing::warn!("No token available for {}", remote);
            callback.on_exchange_event(&ExchangeEvent::no_token_available(remote));
            return Ok(SendOutcome::NoTokenAvailable);
        };
        request.token = token.clone();

        if let Some(displaced) = self
            .registry
            .insert(remote, token.clone(), callback.clone())
        {
            displaced.on_exchange_event(&ExchangeEvent::new(
                remote,
                token.clone(),
                ExchangeEventKind::Displaced,
            ));
        }

        // A shutdown racing this send may have cleared the table before the
        // insert; nothing would ever remove the entry again.
        if self.is_shut_down() {
            let removed = roll_back(
                &self.registry,
                self.tokens.as_ref(),
                remote,
                &token,
                &callback,
                true,
            );
            if !removed {
                self.tokens.release(remote, &token);
            }
            tracing::debug!("Send to {} aborted by shutdown", remote);
            return Err(ClientError::ShutDown);
        }

        tracing::debug!(
            "Write request {} {} to {} (token {})",
            request.code,
            request.uri,
            remote,
            token
        );

        let completion = match self.writer.transmit(request, remote).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::error!("Could not queue request for {}: {}", remote, e);
                roll_back(
                    &self.registry,
                    self.tokens.as_ref(),
                    remote,
                    &token,
                    &callback,
                    true,
                );
                return Err(e);
            }
        };

        self.watch_completion(remote, token.clone(), callback, completion);
        Ok(SendOutcome::Registered(token))
    }

    /// Roll back the registration if the transport reports a failure.
    fn watch_completion(
        &self,
        remote: SocketAddr,
        token: Token,
        callback: Callback,
        completion: Completion,
    ) {
        let registry = Arc::clone(&self.registry);
        let tokens = Arc::clone(&self.tokens);
        let release = self.config.release_token_on_transmit_failure;

        self.scheduler.schedule(async move {
            let Some(error) = transmission_error(completion.await) else {
                return;
            };

            tracing::error!(
                "Could not write request (remote: {}, token: {}): {}",
                remote,
                token,
                error
            );

            let removed = roll_back(&registry, tokens.as_ref(), remote, &token, &callback, release);
            if removed && release {
                tracing::warn!(
                    "Released token {} for {} after failed transmission",
                    token,
                    remote
                );
            }
        });
    }
}

/// Map a completion outcome to the error it reports, if any.
///
/// A completion dropped by the writer counts as a closed transport.
fn transmission_error(
    outcome: std::result::Result<io::Result<()>, oneshot::error::RecvError>,
) -> Option<ClientError> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(ClientError::Io(e)),
        Err(_) => Some(ClientError::TransportClosed),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eventually, remote, Harness, Recorder};
    use super::transmission_error;
    use super::super::{DispatchConfig, Dispatcher, SendOutcome};
    use crate::backpressure::BackpressureController;
    use crate::error::ClientError;
    use crate::handler::{Callback, ClientCallback};
    use crate::protocol::{ControlEvent, ExchangeEventKind, Request, Token};
    use crate::scheduler::DeferredScheduler;
    use crate::token::TokenAllocator;
    use crate::writer::{Outbound, WriterHandle};
    use parking_lot::Mutex;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::{Arc, Weak};
    use tokio::sync::mpsc;

    fn plain(recorder: &Arc<Recorder>) -> Callback {
        Callback::plain(recorder.clone() as Arc<dyn ClientCallback>)
    }

    #[tokio::test]
    async fn test_send_registers_and_queues() {
        let mut h = Harness::new(vec![Some(Token::from_u64(0x7A))]);
        let recorder = Arc::new(Recorder::default());

        let outcome = h
            .dispatcher
            .send(Request::get("/temp"), remote(), plain(&recorder))
            .await
            .unwrap();

        assert_eq!(outcome, SendOutcome::Registered(Token::from_u64(0x7A)));
        assert!(h
            .dispatcher
            .registry()
            .contains(remote(), &Token::from_u64(0x7A)));

        match h.next_item().await {
            Outbound::Message {
                request,
                remote: to,
                completion,
            } => {
                assert_eq!(request.token, Token::from_u64(0x7A));
                assert_eq!(to, remote());
                assert!(completion.is_some());
            }
            other => panic!("unexpected item: {:?}", other),
        }
        assert_eq!(recorder.event_count(), 0);
    }

    #[tokio::test]
    async fn test_no_token_available() {
        let mut h = Harness::new(vec![None]);
        let recorder = Arc::new(Recorder::default());

        let outcome = h
            .dispatcher
            .send(Request::get("/temp"), remote(), plain(&recorder))
            .await
            .unwrap();

        assert_eq!(outcome, SendOutcome::NoTokenAvailable);
        assert_eq!(recorder.event_count(), 1);
        assert_eq!(
            recorder.events.lock()[0].kind,
            ExchangeEventKind::NoTokenAvailable
        );
        assert!(h.dispatcher.registry().is_empty());
        assert!(h.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_bypasses_registry() {
        let mut h = Harness::new(vec![]);
        let recorder = Arc::new(Recorder::default());
        let token = Token::from_u64(0x10);

        let outcome = h
            .dispatcher
            .send(
                Request::cancel_observation("/temp", token.clone()),
                remote(),
                plain(&recorder),
            )
            .await
            .unwrap();

        assert_eq!(outcome, SendOutcome::CancellationForwarded);
        assert!(h.dispatcher.registry().is_empty());

        let items = h.drain().await;
        assert_eq!(items.len(), 2);

        let forwarded = items.iter().any(|item| {
            matches!(
                item,
                Outbound::Message { request, completion: None, .. } if request.token == token
            )
        });
        let cancelled = items.iter().any(|item| {
            matches!(
                item,
                Outbound::Control(ControlEvent::ObservationCancelled { token: t, .. }) if *t == token
            )
        });
        assert!(forwarded);
        assert!(cancelled);
        assert_eq!(h.tokens.release_count(), 0);
    }

    #[tokio::test]
    async fn test_displaced_callback_is_failed() {
        let token = Token::from_u64(1);
        let h = Harness::new(vec![Some(token.clone()), Some(token.clone())]);
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());

        h.dispatcher
            .send(Request::get("/a"), remote(), plain(&first))
            .await
            .unwrap();
        h.dispatcher
            .send(Request::get("/b"), remote(), plain(&second))
            .await
            .unwrap();

        assert_eq!(first.event_count(), 1);
        assert_eq!(first.events.lock()[0].kind, ExchangeEventKind::Displaced);
        assert_eq!(second.event_count(), 0);
        assert_eq!(h.dispatcher.registry().len(), 1);
        assert_eq!(h.tokens.release_count(), 0);
    }

    #[tokio::test]
    async fn test_transmission_failure_rolls_back() {
        let mut h = Harness::new(vec![Some(Token::from_u64(5))]);
        let recorder = Arc::new(Recorder::default());

        h.dispatcher
            .send(Request::get("/temp"), remote(), plain(&recorder))
            .await
            .unwrap();

        match h.next_item().await {
            Outbound::Message {
                completion: Some(completion),
                ..
            } => {
                completion
                    .send(Err(io::Error::new(io::ErrorKind::Other, "link down")))
                    .unwrap();
            }
            other => panic!("unexpected item: {:?}", other),
        }

        let registry = h.dispatcher.registry().clone();
        assert!(eventually(|| registry.is_empty()).await);
        assert!(eventually(|| h.tokens.releases_of(&Token::from_u64(5)) == 1).await);
        assert_eq!(recorder.event_count(), 0);
        assert_eq!(recorder.response_count(), 0);
    }

    #[tokio::test]
    async fn test_transmission_failure_without_release() {
        let config = DispatchConfig {
            release_token_on_transmit_failure: false,
            ..DispatchConfig::default()
        };
        let mut h = Harness::with_config(vec![Some(Token::from_u64(5))], config);
        let recorder = Arc::new(Recorder::default());

        h.dispatcher
            .send(Request::get("/temp"), remote(), plain(&recorder))
            .await
            .unwrap();

        // Dropping the completion counts as a failure.
        drop(h.next_item().await);

        let registry = h.dispatcher.registry().clone();
        assert!(eventually(|| registry.is_empty()).await);
        assert_eq!(h.tokens.release_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_transmission_keeps_registration() {
        let mut h = Harness::new(vec![Some(Token::from_u64(5))]);
        let recorder = Arc::new(Recorder::default());

        h.dispatcher
            .send(Request::get("/temp"), remote(), plain(&recorder))
            .await
            .unwrap();

        if let Outbound::Message {
            completion: Some(completion),
            ..
        } = h.next_item().await
        {
            completion.send(Ok(())).unwrap();
        }

        h.drain().await;
        assert_eq!(h.dispatcher.registry().len(), 1);
        assert_eq!(h.tokens.release_count(), 0);
    }

    #[tokio::test]
    async fn test_writer_gone_rolls_back_and_errors() {
        let h = Harness::new(vec![Some(Token::from_u64(9))]);
        let Harness {
            dispatcher,
            tokens,
            queue,
        } = h;
        drop(queue);
        let recorder = Arc::new(Recorder::default());

        let result = dispatcher
            .send(Request::get("/temp"), remote(), plain(&recorder))
            .await;

        assert!(matches!(result, Err(ClientError::TransportClosed)));
        assert!(dispatcher.registry().is_empty());
        assert_eq!(tokens.releases_of(&Token::from_u64(9)), 1);
    }

    #[tokio::test]
    async fn test_send_after_shutdown() {
        let h = Harness::new(vec![Some(Token::from_u64(1))]);
        let recorder = Arc::new(Recorder::default());
        h.dispatcher.shutdown();

        let result = h
            .dispatcher
            .send(Request::get("/temp"), remote(), plain(&recorder))
            .await;

        assert!(matches!(result, Err(ClientError::ShutDown)));
        assert_eq!(recorder.event_count(), 0);
    }

    /// Allocator that shuts its dispatcher down while handing out a token.
    #[derive(Default)]
    struct ShutdownOnAllocate {
        dispatcher: Mutex<Weak<Dispatcher>>,
        released: Mutex<Vec<Token>>,
    }

    impl TokenAllocator for ShutdownOnAllocate {
        fn allocate(&self, _remote: SocketAddr) -> Option<Token> {
            if let Some(dispatcher) = self.dispatcher.lock().upgrade() {
                dispatcher.shutdown();
            }
            Some(Token::from_u64(1))
        }

        fn release(&self, _remote: SocketAddr, token: &Token) {
            self.released.lock().push(token.clone());
        }
    }

    #[tokio::test]
    async fn test_shutdown_during_send_leaves_registry_empty() {
        let tokens = Arc::new(ShutdownOnAllocate::default());
        let (tx, mut queue) = mpsc::channel(8);
        let writer = WriterHandle::new(tx, BackpressureController::default());
        let dispatcher = Arc::new(Dispatcher::new(
            tokens.clone(),
            writer,
            DeferredScheduler::current().unwrap(),
            DispatchConfig::default(),
        ));
        *tokens.dispatcher.lock() = Arc::downgrade(&dispatcher);
        let recorder = Arc::new(Recorder::default());

        let result = dispatcher
            .send(Request::get("/temp"), remote(), plain(&recorder))
            .await;

        assert!(matches!(result, Err(ClientError::ShutDown)));
        assert!(dispatcher.is_shut_down());
        assert!(dispatcher.registry().is_empty());
        assert_eq!(*tokens.released.lock(), vec![Token::from_u64(1)]);
        assert!(queue.try_recv().is_err());
        assert_eq!(recorder.event_count(), 0);
    }

    #[tokio::test]
    async fn test_transmission_error_mapping() {
        let (tx, rx) = tokio::sync::oneshot::channel::<io::Result<()>>();
        tx.send(Ok(())).unwrap();
        assert!(transmission_error(rx.await).is_none());

        let (tx, rx) = tokio::sync::oneshot::channel::<io::Result<()>>();
        tx.send(Err(io::Error::new(io::ErrorKind::BrokenPipe, "link down")))
            .unwrap();
        let error = transmission_error(rx.await).unwrap();
        assert!(matches!(&error, ClientError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(error.to_string(), "I/O error: link down");

        let (tx, rx) = tokio::sync::oneshot::channel::<io::Result<()>>();
        drop(tx);
        assert!(matches!(
            transmission_error(rx.await),
            Some(ClientError::TransportClosed)
        ));
    }
}
