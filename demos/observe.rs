//! Observe a simulated temperature sensor.
//!
//! A responder task plays the transport below the client: it answers the
//! observation registration with a few update notifications, then ends the
//! observation with a final response.
//!
//! Run with: `RUST_LOG=debug cargo run --example observe`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use coapwire_client::protocol::{content_format, ControlEvent, MessageCode};
use coapwire_client::transport::{ChannelTransport, Transmission};
use coapwire_client::{Client, ClientCallback, ExchangeEvent, Inbound, Request, Response};
use serde::Deserialize;
use tokio::sync::{mpsc, Notify};

const UPDATES: u32 = 3;

#[derive(Debug, Deserialize)]
struct Reading {
    celsius: f32,
}

struct PrintReadings {
    done: Notify,
}

impl ClientCallback for PrintReadings {
    fn on_response(&self, response: &Response) {
        match response.json::<Reading>() {
            Ok(reading) => tracing::info!(
                "{} update {:?}: {:.1} °C",
                response.code,
                response.observe,
                reading.celsius
            ),
            Err(e) => tracing::warn!("Unreadable payload: {}", e),
        }

        if !response.is_update_notification() {
            self.done.notify_one();
        }
    }

    fn on_exchange_event(&self, event: &ExchangeEvent) {
        tracing::info!("Exchange event: {}", event);
        if event.stop_conversation() {
            self.done.notify_one();
        }
    }
}

fn reading(message_id: u16, request: &Request, celsius: f32) -> Response {
    Response::new(message_id, request.token.clone(), MessageCode::CONTENT)
        .with_content_format(content_format::APP_JSON)
        .with_payload(Bytes::from(format!("{{\"celsius\":{}}}", celsius)))
}

/// Answer the first request with `UPDATES` notifications and a final response.
async fn responder(mut wire: mpsc::Receiver<Transmission>, inbound: mpsc::Sender<Inbound>) {
    let mut message_id = 100u16;

    while let Some(transmission) = wire.recv().await {
        match transmission {
            Transmission::Request { request, remote } => {
                tracing::info!(
                    "Server got {} {} (token {})",
                    request.code,
                    request.uri,
                    request.token
                );

                for seq in 1..=UPDATES {
                    message_id += 1;
                    let response =
                        reading(message_id, &request, 20.0 + seq as f32).with_observe(seq);
                    if inbound.send(Inbound::Response { remote, response }).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }

                message_id += 1;
                let response = reading(message_id, &request, 19.5);
                let _ = inbound.send(Inbound::Response { remote, response }).await;
            }
            Transmission::Control(ControlEvent::ObservationCancelled { token, .. }) => {
                tracing::debug!("Server saw cancellation for token {}", token);
            }
            Transmission::Control(ControlEvent::Reset { message_id, .. }) => {
                tracing::debug!("Server saw reset for message {}", message_id);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let sensor: SocketAddr = "192.0.2.10:5683".parse()?;
    let (transport, wire) = ChannelTransport::new(64);
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    tokio::spawn(responder(wire, inbound_tx));

    let client = Client::builder()
        .max_tokens_per_endpoint(16)
        .start(transport, inbound_rx)?;

    let callback = Arc::new(PrintReadings { done: Notify::new() });
    let outcome = client
        .observe(Request::get("/sensors/temp"), sensor, callback.clone())
        .await?;
    tracing::info!("Observation started: {:?}", outcome);

    callback.done.notified().await;
    tracing::info!("Observation ended, {} pending", client.pending_registrations());

    client.shutdown();
    client.wait_for_shutdown().await?;
    Ok(())
}
