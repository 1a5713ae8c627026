//! Connection lifecycle notifications.
//!
//! Each client owns one [`EventBus`]. Handlers run synchronously on the task
//! that raised the event, in the order they subscribed. A panicking handler
//! is logged and skipped; the remaining handlers still run.

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use super::ClientError;
use crate::panic::format_panic;

/// Lifecycle event raised by a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionEvent {
    /// The transport opened.
    Connected,
    /// A listen cycle ended and released the transport.
    Disconnected,
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        })
    }
}

/// Handler invoked for a [`ConnectionEvent`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use devicewire::client::ConnectionHandler;
///
/// let handler: ConnectionHandler = Arc::new(|event| println!("device {event}"));
/// ```
pub type ConnectionHandler = Arc<dyn Fn(ConnectionEvent) + Send + Sync>;

/// Handler invoked when a listen cycle faults.
pub type ExceptionHandler = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// Token returned by the subscribe methods, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Per-client multicast of lifecycle events and faults.
///
/// # Examples
///
/// ```
/// use std::sync::{
///     Arc,
///     atomic::{AtomicUsize, Ordering},
/// };
///
/// use devicewire::client::{ConnectionEvent, EventBus};
///
/// let mut bus = EventBus::default();
/// let connects = Arc::new(AtomicUsize::new(0));
/// let seen = Arc::clone(&connects);
/// let id = bus.subscribe(ConnectionEvent::Connected, move |_| {
///     seen.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.raise(ConnectionEvent::Connected);
/// assert!(bus.unsubscribe(id));
/// bus.raise(ConnectionEvent::Connected);
/// assert_eq!(connects.load(Ordering::SeqCst), 1);
/// ```
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    connection: Vec<(SubscriptionId, ConnectionEvent, ConnectionHandler)>,
    exceptions: Vec<(SubscriptionId, ExceptionHandler)>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("connection_handlers", &self.connection.len())
            .field("exception_handlers", &self.exceptions.len())
            .finish()
    }
}

impl EventBus {
    fn allocate_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Call `handler` whenever `event` is raised.
    pub fn subscribe<F>(&mut self, event: ConnectionEvent, handler: F) -> SubscriptionId
    where
        F: Fn(ConnectionEvent) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.connection.push((id, event, Arc::new(handler)));
        id
    }

    /// Call `handler` whenever a listen cycle faults.
    pub fn subscribe_exceptions<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.exceptions.push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription. Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.connection.len() + self.exceptions.len();
        self.connection.retain(|(sub, _, _)| *sub != id);
        self.exceptions.retain(|(sub, _)| *sub != id);
        before != self.connection.len() + self.exceptions.len()
    }

    /// Number of handlers subscribed to `event`.
    #[must_use]
    pub fn subscriber_count(&self, event: ConnectionEvent) -> usize {
        self.connection
            .iter()
            .filter(|(_, kind, _)| *kind == event)
            .count()
    }

    /// Deliver `event` to its subscribers in subscription order.
    pub fn raise(&self, event: ConnectionEvent) {
        for (id, _, handler) in self.connection.iter().filter(|(_, kind, _)| *kind == event) {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                tracing::error!(
                    %event,
                    subscription = id.0,
                    panic = %format_panic(panic),
                    "event handler panicked"
                );
            }
        }
    }

    /// Deliver `error` to the exception subscribers in subscription order.
    pub fn publish_exception(&self, error: &ClientError) {
        for (id, handler) in &self.exceptions {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(error))) {
                tracing::error!(
                    %error,
                    subscription = id.0,
                    panic = %format_panic(panic),
                    "exception handler panicked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tracing_test::traced_test;

    use super::*;
    use crate::client::ConnectionState;

    fn recorder(bus: &mut EventBus, event: ConnectionEvent) -> Arc<Mutex<Vec<&'static str>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            bus.subscribe(event, move |_| log.lock().expect("log lock").push(name));
        }
        log
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let mut bus = EventBus::default();
        let log = recorder(&mut bus, ConnectionEvent::Connected);
        bus.raise(ConnectionEvent::Connected);
        assert_eq!(*log.lock().expect("log lock"), vec!["first", "second", "third"]);
    }

    #[test]
    fn events_only_reach_their_own_subscribers() {
        let mut bus = EventBus::default();
        let log = recorder(&mut bus, ConnectionEvent::Connected);
        bus.raise(ConnectionEvent::Disconnected);
        assert!(log.lock().expect("log lock").is_empty());
        assert_eq!(bus.subscriber_count(ConnectionEvent::Connected), 3);
        assert_eq!(bus.subscriber_count(ConnectionEvent::Disconnected), 0);
    }

    #[test]
    fn unsubscribe_removes_exactly_one_handler() {
        let mut bus = EventBus::default();
        let id = bus.subscribe(ConnectionEvent::Disconnected, |_| {});
        let other = bus.subscribe_exceptions(|_| {});
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(ConnectionEvent::Disconnected), 0);
        assert!(bus.unsubscribe(other));
    }

    #[traced_test]
    #[test]
    fn panicking_handler_does_not_stop_delivery() {
        let mut bus = EventBus::default();
        bus.subscribe(ConnectionEvent::Connected, |_| panic!("subscriber blew up"));
        let log = recorder(&mut bus, ConnectionEvent::Connected);

        bus.raise(ConnectionEvent::Connected);

        assert_eq!(log.lock().expect("log lock").len(), 3);
        assert!(logs_contain("event handler panicked"));
        assert!(logs_contain("subscriber blew up"));
    }

    #[traced_test]
    #[test]
    fn exceptions_reach_every_subscriber() {
        let mut bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe_exceptions(|_| panic!("first exception handler fails"));
        let log = Arc::clone(&seen);
        bus.subscribe_exceptions(move |err| log.lock().expect("log lock").push(err.to_string()));

        let error = ClientError::InvalidState {
            operation: "listen",
            state: ConnectionState::Disconnected,
        };
        bus.publish_exception(&error);

        assert_eq!(
            *seen.lock().expect("log lock"),
            vec![String::from("cannot listen while disconnected")]
        );
        assert!(logs_contain("exception handler panicked"));
    }
}
