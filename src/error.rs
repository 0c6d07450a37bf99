//! Error types for coapwire-client.

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O error reported by the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (payload codec).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload was not in the content format the caller asked for.
    #[error("Unexpected content format: expected {expected}, got {actual:?}")]
    UnexpectedContentFormat {
        /// Format the decoder handles.
        expected: u16,
        /// Format carried by the message, if any.
        actual: Option<u16>,
    },

    /// Token longer than the protocol permits.
    #[error("Invalid token length: {0} bytes (max 8)")]
    InvalidToken(usize),

    /// The writer task is gone.
    #[error("Transport closed")]
    TransportClosed,

    /// Backpressure timeout - writer queue full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,

    /// Called outside a tokio runtime.
    #[error("No tokio runtime available")]
    NoRuntime,

    /// The client has been shut down.
    #[error("Client shut down")]
    ShutDown,
}

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;
