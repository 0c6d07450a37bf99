//! Message codes.
//!
//! A code is one byte split into a 3-bit class and a 5-bit detail, written
//! `c.dd`:
//! ```text
//! ┌───────┬────────────┐
//! │ Class │   Detail   │
//! │ 3 bits│   5 bits   │
//! └───────┴────────────┘
//! ```
//!
//! Class 0 carries request methods, class 2 success responses, classes 4 and
//! 5 client and server errors.

use std::fmt;

/// Message code (`c.dd`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageCode(u8);

impl MessageCode {
    /// Empty message (0.00).
    pub const EMPTY: MessageCode = MessageCode::new(0, 0);
    /// GET (0.01).
    pub const GET: MessageCode = MessageCode::new(0, 1);
    /// POST (0.02).
    pub const POST: MessageCode = MessageCode::new(0, 2);
    /// PUT (0.03).
    pub const PUT: MessageCode = MessageCode::new(0, 3);
    /// DELETE (0.04).
    pub const DELETE: MessageCode = MessageCode::new(0, 4);

    /// 2.01 Created.
    pub const CREATED: MessageCode = MessageCode::new(2, 1);
    /// 2.02 Deleted.
    pub const DELETED: MessageCode = MessageCode::new(2, 2);
    /// 2.03 Valid.
    pub const VALID: MessageCode = MessageCode::new(2, 3);
    /// 2.04 Changed.
    pub const CHANGED: MessageCode = MessageCode::new(2, 4);
    /// 2.05 Content.
    pub const CONTENT: MessageCode = MessageCode::new(2, 5);

    /// 4.00 Bad Request.
    pub const BAD_REQUEST: MessageCode = MessageCode::new(4, 0);
    /// 4.04 Not Found.
    pub const NOT_FOUND: MessageCode = MessageCode::new(4, 4);
    /// 4.05 Method Not Allowed.
    pub const METHOD_NOT_ALLOWED: MessageCode = MessageCode::new(4, 5);
    /// 4.15 Unsupported Content-Format.
    pub const UNSUPPORTED_CONTENT_FORMAT: MessageCode = MessageCode::new(4, 15);
    /// 5.00 Internal Server Error.
    pub const INTERNAL_SERVER_ERROR: MessageCode = MessageCode::new(5, 0);
    /// 5.03 Service Unavailable.
    pub const SERVICE_UNAVAILABLE: MessageCode = MessageCode::new(5, 3);

    /// Build a code from class and detail.
    pub const fn new(class: u8, detail: u8) -> Self {
        Self(((class & 0x07) << 5) | (detail & 0x1F))
    }

    /// Wrap a raw code byte.
    #[inline]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw code byte.
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Code class (upper 3 bits).
    #[inline]
    pub const fn class(self) -> u8 {
        self.0 >> 5
    }

    /// Code detail (lower 5 bits).
    #[inline]
    pub const fn detail(self) -> u8 {
        self.0 & 0x1F
    }

    /// Check if this is a request method.
    #[inline]
    pub fn is_request(self) -> bool {
        self.class() == 0 && self.detail() != 0
    }

    /// Check if this is a success response (2.xx).
    #[inline]
    pub fn is_success(self) -> bool {
        self.class() == 2
    }

    /// Check if this is an error response (4.xx or 5.xx).
    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self.class(), 4 | 5)
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

impl fmt::Debug for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageCode({})", self)
    }
}
