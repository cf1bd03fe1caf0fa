//! # Event bus for broadcasting engine events.
//!
//! [`Bus`] is a wrapper around [`tokio::sync::broadcast`] that lets the
//! injector, the worker host, and the subscriber fan-out exchange
//! [`Event`]s without coupling to each other.
//!
//! ## Key characteristics:
//! - **Broadcast semantics**: all active subscribers receive a clone of each event
//! - **Non-persistent**: events are lost if there are no active subscribers
//! - **Bounded capacity**: old events are dropped for lagging receivers when full
//!
//! [`Bus::publish`] is non-blocking; [`Bus::subscribe`] creates an
//! independent receiver for all future events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for engine events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no active subscribers the event is dropped silently;
    /// the engine operates the same with or without observers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new subscriber that will receive all future events.
    ///
    /// Each call creates an independent receiver; every receiver gets a
    /// clone of every event published after its subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
