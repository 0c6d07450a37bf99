//! Caller-supplied callbacks.
//!
//! A [`ClientCallback`] receives the outcome of one request. Whether it is a
//! one-shot callback or an observation is fixed when it is wrapped in a
//! [`Callback`], not queried on every response.
//!
//! # Example
//!
//! ```
//! use coapwire_client::handler::{Callback, ClientCallback};
//! use coapwire_client::protocol::{ExchangeEvent, Response};
//! use std::sync::Arc;
//!
//! struct PrintCallback;
//!
//! impl ClientCallback for PrintCallback {
//!     fn on_response(&self, response: &Response) {
//!         println!("{} {:?}", response.code, response.payload);
//!     }
//!
//!     fn on_exchange_event(&self, event: &ExchangeEvent) {
//!         println!("{}", event);
//!     }
//! }
//!
//! let callback = Callback::observing(Arc::new(PrintCallback));
//! assert!(callback.is_observing());
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::protocol::{ExchangeEvent, Response};

/// Receiver of responses and exchange events for one request.
///
/// Methods are called from the dispatcher's tasks and must not block.
pub trait ClientCallback: Send + Sync + 'static {
    /// A response correlated to the request arrived.
    fn on_response(&self, response: &Response);

    /// Something happened to the message exchange.
    fn on_exchange_event(&self, event: &ExchangeEvent);
}

/// A callback tagged with its lifecycle.
///
/// Cloning shares the underlying callback.
#[derive(Clone)]
pub enum Callback {
    /// Expects exactly one response.
    Plain(Arc<dyn ClientCallback>),
    /// Expects update notifications until the observation ends.
    Observing(Arc<dyn ClientCallback>),
}

impl Callback {
    /// Wrap a one-shot callback.
    pub fn plain(callback: Arc<dyn ClientCallback>) -> Self {
        Self::Plain(callback)
    }

    /// Wrap an observation callback.
    pub fn observing(callback: Arc<dyn ClientCallback>) -> Self {
        Self::Observing(callback)
    }

    /// Whether this callback observes a resource.
    #[inline]
    pub fn is_observing(&self) -> bool {
        matches!(self, Self::Observing(_))
    }

    /// The wrapped callback.
    #[inline]
    pub fn inner(&self) -> &Arc<dyn ClientCallback> {
        match self {
            Self::Plain(cb) | Self::Observing(cb) => cb,
        }
    }

    /// Deliver a response.
    ///
    /// A panicking callback is logged and does not unwind into the caller.
    pub fn on_response(&self, response: &Response) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.inner().on_response(response)
        }));
        if let Err(payload) = result {
            tracing::error!(
                "Callback panicked on response (token {}): {}",
                response.token,
                panic_message(payload.as_ref())
            );
        }
    }

    /// Deliver an exchange event.
    ///
    /// A panicking callback is logged and does not unwind into the caller.
    pub fn on_exchange_event(&self, event: &ExchangeEvent) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.inner().on_exchange_event(event)
        }));
        if let Err(payload) = result {
            tracing::error!(
                "Callback panicked on exchange event {}: {}",
                event,
                panic_message(payload.as_ref())
            );
        }
    }

    /// Whether both wrap the same callback object.
    pub fn same_callback(&self, other: &Callback) -> bool {
        Arc::ptr_eq(self.inner(), other.inner())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Callback::Plain"),
            Self::Observing(_) => f.write_str("Callback::Observing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessageCode, Token};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        responses: AtomicUsize,
        events: AtomicUsize,
    }

    impl ClientCallback for Counting {
        fn on_response(&self, _response: &Response) {
            self.responses.fetch_add(1, Ordering::SeqCst);
        }

        fn on_exchange_event(&self, _event: &ExchangeEvent) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_variant_discriminates() {
        let cb: Arc<dyn ClientCallback> = Arc::new(Counting::default());
        assert!(!Callback::plain(cb.clone()).is_observing());
        assert!(Callback::observing(cb).is_observing());
    }

    #[test]
    fn test_delivery_reaches_inner() {
        let counting = Arc::new(Counting::default());
        let callback = Callback::plain(counting.clone());
        let remote = "10.0.0.5:5683".parse().unwrap();

        callback.on_response(&Response::new(1, Token::from_u64(1), MessageCode::CONTENT));
        callback.on_exchange_event(&ExchangeEvent::no_token_available(remote));

        assert_eq!(counting.responses.load(Ordering::SeqCst), 1);
        assert_eq!(counting.events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_callback() {
        let cb: Arc<dyn ClientCallback> = Arc::new(Counting::default());
        let a = Callback::plain(cb.clone());
        let b = Callback::observing(cb);
        let c = Callback::plain(Arc::new(Counting::default()));

        assert!(a.same_callback(&b));
        assert!(!a.same_callback(&c));
    }

    struct Panicking;

    impl ClientCallback for Panicking {
        fn on_response(&self, _response: &Response) {
            panic!("response handler failed");
        }

        fn on_exchange_event(&self, event: &ExchangeEvent) {
            panic!("event handler failed: {}", event);
        }
    }

    #[test]
    fn test_panicking_callback_does_not_unwind() {
        let callback = Callback::observing(Arc::new(Panicking));
        let remote = "10.0.0.5:5683".parse().unwrap();

        callback.on_response(&Response::new(1, Token::from_u64(1), MessageCode::CONTENT));
        callback.on_exchange_event(&ExchangeEvent::no_token_available(remote));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
