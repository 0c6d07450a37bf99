//! Exchange events, control events and inbound items.
//!
//! Exchange events travel up from the transport and tell a callback what
//! happened to its message exchange. Control events travel down to the
//! transport. [`Inbound`] is what the transport hands to the dispatcher.

use std::fmt;
use std::net::SocketAddr;

use super::message::Response;
use super::token::Token;

/// What happened to a message exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeEventKind {
    /// The transport assigned a message ID to the request.
    MessageIdAssigned(u16),
    /// The request was retransmitted.
    MessageRetransmitted {
        /// Retransmission counter, starting at 1.
        attempt: u8,
    },
    /// The server acknowledged the request without piggybacking a response.
    EmptyAckReceived,
    /// The server rejected the request with a reset.
    ResetReceived,
    /// Retransmissions are exhausted without acknowledgement.
    TransmissionTimeout,
    /// The transport could not send the message.
    TransmissionFailed,
    /// No token could be allocated for the endpoint.
    NoTokenAvailable,
    /// Another registration took over this callback's token.
    Displaced,
}

impl ExchangeEventKind {
    /// Whether this event ends the conversation for its token.
    #[inline]
    pub fn stop_conversation(self) -> bool {
        match self {
            Self::MessageIdAssigned(_)
            | Self::MessageRetransmitted { .. }
            | Self::EmptyAckReceived => false,
            Self::ResetReceived
            | Self::TransmissionTimeout
            | Self::TransmissionFailed
            | Self::NoTokenAvailable
            | Self::Displaced => true,
        }
    }
}

/// Transport-originated signal about the fate of a message exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeEvent {
    /// The other party of the exchange.
    pub remote: SocketAddr,
    /// Token of the exchange, if one was assigned.
    pub token: Option<Token>,
    /// What happened.
    pub kind: ExchangeEventKind,
}

impl ExchangeEvent {
    /// Create an event for a token.
    pub fn new(remote: SocketAddr, token: Token, kind: ExchangeEventKind) -> Self {
        Self {
            remote,
            token: Some(token),
            kind,
        }
    }

    /// Token space of `remote` is exhausted.
    pub fn no_token_available(remote: SocketAddr) -> Self {
        Self {
            remote,
            token: None,
            kind: ExchangeEventKind::NoTokenAvailable,
        }
    }

    /// Whether this event ends the conversation for its token.
    #[inline]
    pub fn stop_conversation(&self) -> bool {
        self.kind.stop_conversation()
    }
}

impl fmt::Display for ExchangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(token) => write!(
                f,
                "{:?} (remote: {}, token: {})",
                self.kind, self.remote, token
            ),
            None => write!(f, "{:?} (remote: {})", self.kind, self.remote),
        }
    }
}

/// Signal sent down to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Stop delivering notifications for this observation.
    ObservationCancelled {
        /// Observed endpoint.
        remote: SocketAddr,
        /// Token of the observation.
        token: Token,
    },
    /// Answer an uncorrelated message with a reset.
    Reset {
        /// Sender of the uncorrelated message.
        remote: SocketAddr,
        /// Message ID being reset.
        message_id: u16,
    },
}

/// Item delivered by the transport to the receive path.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A response from `remote`.
    Response {
        /// Sender of the response.
        remote: SocketAddr,
        /// The response.
        response: Response,
    },
    /// An exchange event.
    Exchange(ExchangeEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> SocketAddr {
        "10.0.0.5:5683".parse().unwrap()
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(ExchangeEventKind::ResetReceived.stop_conversation());
        assert!(ExchangeEventKind::TransmissionTimeout.stop_conversation());
        assert!(ExchangeEventKind::TransmissionFailed.stop_conversation());
        assert!(ExchangeEventKind::NoTokenAvailable.stop_conversation());
        assert!(ExchangeEventKind::Displaced.stop_conversation());
    }

    #[test]
    fn test_non_terminal_kinds() {
        assert!(!ExchangeEventKind::MessageIdAssigned(7).stop_conversation());
        assert!(!ExchangeEventKind::MessageRetransmitted { attempt: 2 }.stop_conversation());
        assert!(!ExchangeEventKind::EmptyAckReceived.stop_conversation());
    }

    #[test]
    fn test_no_token_available_has_no_token() {
        let event = ExchangeEvent::no_token_available(remote());
        assert_eq!(event.token, None);
        assert!(event.stop_conversation());
    }

    #[test]
    fn test_display() {
        let event = ExchangeEvent::new(
            remote(),
            Token::from_u64(0x7A),
            ExchangeEventKind::ResetReceived,
        );
        assert_eq!(
            event.to_string(),
            "ResetReceived (remote: 10.0.0.5:5683, token: 0x7a)"
        );
    }
}
