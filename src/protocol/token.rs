//! Correlation tokens.
//!
//! A token is 0 to 8 opaque bytes chosen by the client. It only means
//! something together with the remote endpoint it was allocated for.
//!
//! # Example
//!
//! ```
//! use coapwire_client::protocol::Token;
//!
//! let token = Token::from_u64(0x7A);
//! assert_eq!(token.as_bytes(), &[0x7A]);
//! assert_eq!(token.to_string(), "0x7a");
//! ```

use std::fmt;

use bytes::Bytes;

use crate::error::{ClientError, Result};

/// Maximum token length in bytes.
pub const MAX_TOKEN_LENGTH: usize = 8;

/// Opaque per-endpoint correlation identifier.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Token(Bytes);

impl Token {
    /// The zero-length token.
    pub const EMPTY: Token = Token(Bytes::new());

    /// Create a token from raw bytes.
    ///
    /// Fails if more than [`MAX_TOKEN_LENGTH`] bytes are given.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() > MAX_TOKEN_LENGTH {
            return Err(ClientError::InvalidToken(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Create a token holding the minimal big-endian encoding of `value`.
    ///
    /// `0` maps to the empty token.
    pub fn from_u64(value: u64) -> Self {
        let be = value.to_be_bytes();
        let skip = (value.leading_zeros() / 8) as usize;
        Self(Bytes::copy_from_slice(&be[skip..]))
    }

    /// Token bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Token length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the zero-length token.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<empty>");
        }
        f.write_str("0x")?;
        // Two digits per byte, so the length stays visible.
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self)
    }
}
