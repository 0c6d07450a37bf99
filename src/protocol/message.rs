//! Request and response messages as seen by the correlation layer.
//!
//! Only the fields the dispatcher looks at are modeled; encoding to bytes is
//! the transport's job. Payloads use `bytes::Bytes` so they can be shared
//! with the transport without copying.
//!
//! # Example
//!
//! ```
//! use coapwire_client::protocol::{MessageCode, Request, Response, Token};
//! use bytes::Bytes;
//!
//! let request = Request::get("/sensors/temp").with_observe_registration();
//! assert!(request.is_observation_registration());
//!
//! let response = Response::new(17, Token::from_u64(0x10), MessageCode::CONTENT)
//!     .with_observe(3)
//!     .with_payload(Bytes::from_static(b"21.5"));
//! assert!(response.is_update_notification());
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::code::MessageCode;
use super::content_format;
use super::token::Token;
use crate::codec::JsonCodec;
use crate::error::{ClientError, Result};

/// Observe option value that registers an observation.
pub const OBSERVE_REGISTER: u32 = 0;

/// Observe option value that deregisters an observation.
pub const OBSERVE_DEREGISTER: u32 = 1;

/// Outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Request method.
    pub code: MessageCode,
    /// Target resource path.
    pub uri: String,
    /// Correlation token. Overwritten by the dispatcher unless the request
    /// cancels an observation.
    pub token: Token,
    /// Observe option, if present.
    pub observe: Option<u32>,
    /// Content format of the payload, if any.
    pub content_format: Option<u16>,
    /// Request payload.
    pub payload: Bytes,
}

impl Request {
    /// Create a request with the given method and path.
    pub fn new(code: MessageCode, uri: impl Into<String>) -> Self {
        Self {
            code,
            uri: uri.into(),
            token: Token::EMPTY,
            observe: None,
            content_format: None,
            payload: Bytes::new(),
        }
    }

    /// GET request.
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(MessageCode::GET, uri)
    }

    /// Request that ends the observation identified by `token`.
    ///
    /// The token is sent as-is; no new token is allocated for it.
    pub fn cancel_observation(uri: impl Into<String>, token: Token) -> Self {
        Self {
            token,
            observe: Some(OBSERVE_DEREGISTER),
            ..Self::get(uri)
        }
    }

    /// Mark this request as an observation registration.
    pub fn with_observe_registration(mut self) -> Self {
        self.observe = Some(OBSERVE_REGISTER);
        self
    }

    /// Attach a payload with its content format.
    pub fn with_payload(mut self, content_format: u16, payload: Bytes) -> Self {
        self.content_format = Some(content_format);
        self.payload = payload;
        self
    }

    /// Check if this request registers an observation.
    #[inline]
    pub fn is_observation_registration(&self) -> bool {
        self.observe == Some(OBSERVE_REGISTER)
    }

    /// Check if this request cancels an observation.
    #[inline]
    pub fn is_observation_cancellation(&self) -> bool {
        self.observe == Some(OBSERVE_DEREGISTER)
    }
}

/// Inbound response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Message ID assigned by the sender (used for resets).
    pub message_id: u16,
    /// Correlation token echoed by the server.
    pub token: Token,
    /// Response code.
    pub code: MessageCode,
    /// Observe sequence number; present on update notifications.
    pub observe: Option<u32>,
    /// Content format of the payload, if any.
    pub content_format: Option<u16>,
    /// Response payload.
    pub payload: Bytes,
}

impl Response {
    /// Create an empty-payload response.
    pub fn new(message_id: u16, token: Token, code: MessageCode) -> Self {
        Self {
            message_id,
            token,
            code,
            observe: None,
            content_format: None,
            payload: Bytes::new(),
        }
    }

    /// Set the observe sequence number.
    pub fn with_observe(mut self, sequence: u32) -> Self {
        self.observe = Some(sequence);
        self
    }

    /// Set the payload (content format left unchanged).
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }

    /// Set the content format.
    pub fn with_content_format(mut self, content_format: u16) -> Self {
        self.content_format = Some(content_format);
        self
    }

    /// Check if this response is an update notification of an observation.
    #[inline]
    pub fn is_update_notification(&self) -> bool {
        self.observe.is_some()
    }

    /// Check if this response carries an error code.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.code.is_error()
    }

    /// Decode a JSON payload.
    ///
    /// Fails with `UnexpectedContentFormat` unless the content format is
    /// `application/json`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.content_format != Some(content_format::APP_JSON) {
            return Err(ClientError::UnexpectedContentFormat {
                expected: content_format::APP_JSON,
                actual: self.content_format,
            });
        }
        JsonCodec::decode(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_observation_keeps_token() {
        let token = Token::from_u64(0x10);
        let request = Request::cancel_observation("/temp", token.clone());

        assert_eq!(request.token, token);
        assert!(request.is_observation_cancellation());
        assert!(!request.is_observation_registration());
        assert_eq!(request.code, MessageCode::GET);
    }

    #[test]
    fn test_plain_request_has_no_observe() {
        let request = Request::get("/temp");
        assert_eq!(request.observe, None);
        assert!(request.token.is_empty());
    }

    #[test]
    fn test_update_notification_flag() {
        let plain = Response::new(1, Token::from_u64(1), MessageCode::CONTENT);
        assert!(!plain.is_update_notification());
        assert!(plain.with_observe(0).is_update_notification());
    }

    #[test]
    fn test_json_payload() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Reading {
            celsius: f32,
        }

        let response = Response::new(1, Token::from_u64(1), MessageCode::CONTENT)
            .with_content_format(content_format::APP_JSON)
            .with_payload(Bytes::from_static(br#"{"celsius":21.5}"#));

        let reading: Reading = response.json().unwrap();
        assert_eq!(reading, Reading { celsius: 21.5 });
    }

    #[test]
    fn test_json_rejects_other_formats() {
        let response = Response::new(1, Token::from_u64(1), MessageCode::CONTENT)
            .with_content_format(content_format::TEXT_PLAIN_UTF8)
            .with_payload(Bytes::from_static(b"21.5"));

        let err = response.json::<f32>().unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedContentFormat {
                expected: 50,
                actual: Some(0)
            }
        ));
    }
}
