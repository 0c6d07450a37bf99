//! Codec module - payload serialization helpers.
//!
//! - [`JsonCodec`] - JSON using `serde_json`, for `application/json` payloads
//!
//! Codecs are marker structs with static methods, selected at compile time.
//!
//! # Example
//!
//! ```
//! use coapwire_client::codec::JsonCodec;
//!
//! let encoded = JsonCodec::encode(&"hello").unwrap();
//! let decoded: String = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod json;

pub use json::JsonCodec;
