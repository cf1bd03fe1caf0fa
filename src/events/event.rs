//! # Engine events and their classification.
//!
//! [`EventKind`] covers three categories:
//! - **Registry events**: factory/item bookkeeping (`FactoryAdded`,
//!   `FactoryRemoved`, `ItemPushed`, `ItemRevoked`)
//! - **Child lifecycle events**: worker instantiations driven by matching
//!   (`ChildStarting`, `ChildStarted`, `ChildStopping`, `ChildStopped`)
//! - **Host/runtime events**: `RpcFailed`, `ShutdownRequested`, and
//!   subscriber-delivery diagnostics
//!
//! ## Event flow examples
//!
//! ### Simple match
//! ```text
//! add_factory(a) → FactoryAdded
//! push(x, 7)     → ItemPushed → ChildStarting → ChildStarted
//! ```
//!
//! ### Cascade
//! ```text
//! withdraw(item) → ItemRevoked → (per dependent entry)
//!                  ChildStopping → ChildStopped
//! ```
//!
//! ### Failed spawn
//! ```text
//! ChildStarting → ChildStopped (error = spawn failure, no ChildStarted)
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::factories::FactoryId;
use crate::host::WorkerId;
use crate::items::{ItemRef, Key};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of engine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Registry events ===
    /// A factory was registered.
    FactoryAdded,
    /// A factory was removed. Running children are unaffected.
    FactoryRemoved,
    /// An item entered the item table.
    ItemPushed,
    /// An item left the item table (withdrawn or owner died).
    ItemRevoked,

    // === Child lifecycle events ===
    /// Matching selected a tuple; a spawn is about to be attempted.
    ChildStarting,
    /// The spawn succeeded and the entry is now active.
    ChildStarted,
    /// Teardown of an active entry is about to be requested.
    ChildStopping,
    /// The entry is gone: torn down, died on its own, or its spawn failed.
    ChildStopped,

    // === Host/runtime events ===
    /// An RPC returned an error to its caller.
    RpcFailed,
    /// Graceful engine shutdown was requested.
    ShutdownRequested,

    // === Subscriber diagnostics ===
    /// A subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
    /// A subscriber panicked during event processing.
    SubscriberPanicked,
}

/// Engine event with optional metadata.
///
/// ## Fields
/// - `seq`: unique sequence number (monotonically increasing)
/// - `at`: wall-clock timestamp (may go backwards, use for logging only)
/// - `kind`: event classification
/// - `factory`, `key`, `value`, `item`, `worker`, `tuple`, `error`:
///   optional metadata, populated per kind
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Factory id, for registry and child events.
    pub factory: Option<FactoryId>,
    /// Item key, for item events.
    pub key: Option<Key>,
    /// Rendered payload: the item value, or the argument tuple contents.
    pub value: Option<String>,
    /// Item ref, for item events.
    pub item: Option<ItemRef>,
    /// Worker id, for child and RPC events.
    pub worker: Option<WorkerId>,
    /// Argument tuple, pointwise item refs, for child events.
    pub tuple: Option<Vec<ItemRef>>,
    /// Failure or termination reason, if the event represents one.
    pub error: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            factory: None,
            key: None,
            value: None,
            item: None,
            worker: None,
            tuple: None,
            error: None,
        }
    }

    /// Attaches a factory id.
    pub fn with_factory(mut self, id: FactoryId) -> Self {
        self.factory = Some(id);
        self
    }

    /// Attaches an item key.
    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    /// Attaches a rendered payload.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attaches an item ref.
    pub fn with_item(mut self, item: ItemRef) -> Self {
        self.item = Some(item);
        self
    }

    /// Attaches a worker id.
    pub fn with_worker(mut self, worker: WorkerId) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attaches an argument tuple.
    pub fn with_tuple(mut self, tuple: Vec<ItemRef>) -> Self {
        self.tuple = Some(tuple);
        self
    }

    /// Attaches a failure or termination reason.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Creates a subscriber overflow event.
    pub(crate) fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_error(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    pub(crate) fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_error(format!("subscriber={subscriber} panic={info}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::now(EventKind::ItemPushed);
        let b = Event::now(EventKind::ItemPushed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_populate_fields() {
        let ev = Event::now(EventKind::ChildStopped)
            .with_factory(FactoryId::from("probe"))
            .with_error("revoked: unplugged");
        assert_eq!(ev.kind, EventKind::ChildStopped);
        assert_eq!(ev.factory.as_ref().map(|f| f.as_str()), Some("probe"));
        assert_eq!(ev.error.as_deref(), Some("revoked: unplugged"));
    }
}
