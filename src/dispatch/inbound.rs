//! Receive path: resolve inbound items against the registry.

use std::net::SocketAddr;

use super::Dispatcher;
use crate::handler::Resolved;
use crate::protocol::{ControlEvent, ExchangeEvent, Inbound, Response};

impl Dispatcher {
    /// Route an inbound item to its callback.
    ///
    /// Items arriving after shutdown are ignored.
    pub async fn handle_inbound(&self, inbound: Inbound) {
        if self.is_shut_down() {
            tracing::debug!("Ignoring inbound item after shutdown: {:?}", inbound);
            return;
        }

        match inbound {
            Inbound::Response { remote, response } => self.handle_response(remote, response).await,
            Inbound::Exchange(event) => self.handle_exchange_event(event),
        }
    }

    /// Deliver an exchange event.
    ///
    /// A conversation-stopping event removes the registration (and releases
    /// its token) before delivery; any other event leaves it in place. Events
    /// nobody waits for are dropped.
    pub fn handle_exchange_event(&self, event: ExchangeEvent) {
        let Some(token) = event.token.as_ref() else {
            tracing::warn!("No callback found for event: {}!", event);
            return;
        };

        let callback = if event.stop_conversation() {
            let removed = self.registry.remove(event.remote, token);
            if removed.is_some() {
                self.tokens.release(event.remote, token);
            }
            removed
        } else {
            self.registry.get(event.remote, token)
        };

        match callback {
            Some(callback) => callback.on_exchange_event(&event),
            None => tracing::warn!("No callback found for event: {}!", event),
        }
    }

    /// Deliver a response.
    ///
    /// - Uncorrelated responses are answered with a reset.
    /// - A plain callback is removed and its token released.
    /// - An observing callback is removed only on an error response or a
    ///   response that is not an update notification. A deferred
    ///   `ObservationCancelled` goes out for every response it receives
    ///   (or only the terminal one, see `cancel_on_every_notification`).
    ///
    /// The callback sees the response after the registry has been updated.
    pub async fn handle_response(&self, remote: SocketAddr, response: Response) {
        tracing::debug!(
            "Response received from {}: {} (token {}, message ID {})",
            remote,
            response.code,
            response.token,
            response.message_id
        );

        let token = response.token.clone();
        let is_error = response.is_error();
        let is_update = response.is_update_notification();

        let resolved = self.registry.resolve(remote, &token, |callback| {
            !callback.is_observing() || is_error || !is_update
        });

        let Some(Resolved { callback, removed }) = resolved else {
            tracing::warn!(
                "No callback found for response from {} (token {}, message ID {})",
                remote,
                token,
                response.message_id
            );
            let reset = ControlEvent::Reset {
                remote,
                message_id: response.message_id,
            };
            if let Err(e) = self.writer.control(reset).await {
                tracing::error!("Could not queue reset for {}: {}", remote, e);
            }
            return;
        };

        if removed {
            self.tokens.release(remote, &token);
        }

        if callback.is_observing() {
            if removed {
                if is_error {
                    tracing::info!("Observation callback removed because of error response!");
                } else {
                    tracing::info!(
                        "Observation callback removed because incoming response was no update notification!"
                    );
                }
            }

            if removed || self.config.cancel_on_every_notification {
                tracing::debug!("Send observation cancellation event!");
                self.scheduler.emit_control(
                    &self.writer,
                    ControlEvent::ObservationCancelled {
                        remote,
                        token: token.clone(),
                    },
                );
            }
        }

        tracing::debug!("Callback found for token {} from {}", token, remote);
        callback.on_response(&response);
    }
}
