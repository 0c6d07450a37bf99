//! Protocol module - the message model the correlation layer works on.
//!
//! - Tokens and message codes
//! - Requests and responses
//! - Exchange events (up), control events (down), inbound items

mod code;
pub mod content_format;
mod event;
mod message;
mod token;

pub use code::MessageCode;
pub use event::{ControlEvent, ExchangeEvent, ExchangeEventKind, Inbound};
pub use message::{Request, Response, OBSERVE_DEREGISTER, OBSERVE_REGISTER};
pub use token::{Token, MAX_TOKEN_LENGTH};
