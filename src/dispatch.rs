//! Event dispatcher mapping envelope types to registered reactions.
//!
//! Consumers register handlers per [`EventType`]; the connection driver
//! publishes every decoded envelope. Handlers for a type run in registration
//! order, a type with no handlers is discarded without error, and a handler
//! that panics is isolated so later handlers and later envelopes still run.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::messages::{Envelope, EventType};

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registry of reactions keyed by message type.
///
/// Shared between the channel handle (which registers handlers) and the
/// driver task (which publishes envelopes). Publishing snapshots the handler
/// list before invoking it, so subscribing from inside a handler is safe.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<EventType, Vec<Handler>>>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count: usize = self
            .handlers
            .read()
            .map(|map| map.values().map(Vec::len).sum())
            .unwrap_or(0);
        f.debug_struct("EventDispatcher")
            .field("handlers", &count)
            .finish()
    }
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a reaction for the given message type.
    ///
    /// Multiple handlers may share a type; they run in registration order.
    pub fn subscribe<F>(&self, event_type: EventType, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        if let Ok(mut map) = self.handlers.write() {
            map.entry(event_type).or_default().push(Arc::new(handler));
        }
    }

    /// Invokes every handler registered for the envelope's type, passing the
    /// payload. An envelope with no registered handlers is discarded.
    pub fn publish(&self, envelope: &Envelope) {
        let snapshot: Vec<Handler> = self
            .handlers
            .read()
            .ok()
            .and_then(|map| map.get(&envelope.event_type).cloned())
            .unwrap_or_default();

        if snapshot.is_empty() {
            tracing::trace!(event_type = %envelope.event_type, "no handler registered, envelope discarded");
            return;
        }

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(&envelope.data))).is_err() {
                tracing::warn!(event_type = %envelope.event_type, "notification handler panicked");
            }
        }
    }

    /// Returns the number of handlers registered for a type.
    #[must_use]
    pub fn handler_count(&self, event_type: &EventType) -> usize {
        self.handlers
            .read()
            .ok()
            .and_then(|map| map.get(event_type).map(Vec::len))
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn envelope(event_type: EventType) -> Envelope {
        Envelope::new(event_type, serde_json::json!({"k": "v"}))
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in 1..=3 {
            let order = Arc::clone(&order);
            dispatcher.subscribe(EventType::NewMatch, move |_| {
                if let Ok(mut seen) = order.lock() {
                    seen.push(label);
                }
            });
        }

        dispatcher.publish(&envelope(EventType::NewMatch));

        let Ok(seen) = order.lock() else {
            panic!("order lock poisoned");
        };
        assert_eq!(*seen, vec![1, 2, 3]);
    }

    #[test]
    fn unregistered_type_is_discarded() {
        let dispatcher = EventDispatcher::new();
        // Must not panic or error.
        dispatcher.publish(&envelope(EventType::Other("mystery".to_string())));
    }

    #[test]
    fn panicking_handler_does_not_stop_later_handlers() {
        let dispatcher = EventDispatcher::new();
        let ran = Arc::new(Mutex::new(0_u32));

        dispatcher.subscribe(EventType::NewMessage, |_| panic!("handler bug"));
        {
            let ran = Arc::clone(&ran);
            dispatcher.subscribe(EventType::NewMessage, move |_| {
                if let Ok(mut count) = ran.lock() {
                    *count += 1;
                }
            });
        }

        dispatcher.publish(&envelope(EventType::NewMessage));
        // A later envelope must also still be delivered.
        dispatcher.publish(&envelope(EventType::NewMessage));

        let Ok(count) = ran.lock() else {
            panic!("counter lock poisoned");
        };
        assert_eq!(*count, 2);
    }

    #[test]
    fn handler_receives_payload() {
        let dispatcher = EventDispatcher::new();
        let payload = Arc::new(Mutex::new(Value::Null));

        {
            let payload = Arc::clone(&payload);
            dispatcher.subscribe(EventType::Notification, move |data| {
                if let Ok(mut slot) = payload.lock() {
                    *slot = data.clone();
                }
            });
        }

        dispatcher.publish(&envelope(EventType::Notification));

        let Ok(seen) = payload.lock() else {
            panic!("payload lock poisoned");
        };
        assert_eq!(seen["k"], "v");
    }

    #[test]
    fn duplicate_handlers_are_allowed() {
        let dispatcher = EventDispatcher::new();
        dispatcher.subscribe(EventType::Pong, |_| {});
        dispatcher.subscribe(EventType::Pong, |_| {});
        assert_eq!(dispatcher.handler_count(&EventType::Pong), 2);
        assert_eq!(dispatcher.handler_count(&EventType::Ping), 0);
    }
}
