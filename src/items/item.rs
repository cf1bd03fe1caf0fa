//! # Item handle, keys, and payloads.
//!
//! ## Identity
//! Two items with equal `(key, value)` are still distinct when their
//! [`ItemRef`]s differ: matching, table bookkeeping, and tuple equality
//! all go by ref, never by value.
//!
//! ## Revocation
//! `withdraw(reason)` terminates the item and fires its monitors; it is
//! idempotent and irreversible. A withdrawn item pushed again is a no-op:
//! a revoked ref never re-enters the item table.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::error::ExitReason;
use crate::host::{DownSender, MonitorHub, MonitorToken, WorkerHandle, WorkerId};

/// Global counter for item refs.
static ITEM_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opaque, atom-like item key.
///
/// Cheap to clone; compared, hashed, and ordered by its text.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    /// The key's text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(Arc::from(s.as_str()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable item identity: equality and monitoring go by ref.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemRef(u64);

impl ItemRef {
    fn next() -> Self {
        Self(ITEM_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Debug for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque item payload: anything debuggable, sendable, and downcastable.
pub trait Payload: Any + fmt::Debug + Send + Sync {
    /// Upcast for downcasting by consumers.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared payload pointer as stored in items and dependency lists.
pub type Value = Arc<dyn Payload>;

struct ItemInner {
    key: Key,
    value: Value,
    item_ref: ItemRef,
    owner: Option<WorkerHandle>,
    hub: MonitorHub,
}

/// Cheap-clone handle to one keyed unit of state.
#[derive(Clone)]
pub struct Item {
    inner: Arc<ItemInner>,
}

impl Item {
    /// Creates a fresh item with a unique ref and no owner.
    pub fn new(key: impl Into<Key>, value: impl Payload) -> Self {
        Self::build(key.into(), Arc::new(value), None)
    }

    /// Creates a fresh item owned by the given worker. When the owner
    /// dies, the injector revokes the item.
    pub fn owned(key: impl Into<Key>, value: impl Payload, owner: &WorkerHandle) -> Self {
        Self::build(key.into(), Arc::new(value), Some(owner.clone()))
    }

    fn build(key: Key, value: Value, owner: Option<WorkerHandle>) -> Self {
        Self {
            inner: Arc::new(ItemInner {
                key,
                value,
                item_ref: ItemRef::next(),
                owner,
                hub: MonitorHub::new(),
            }),
        }
    }

    /// The item's key.
    pub fn key(&self) -> &Key {
        &self.inner.key
    }

    /// The item's payload.
    pub fn value(&self) -> &Value {
        &self.inner.value
    }

    /// Downcasts the payload to a concrete type.
    pub fn value_as<T: 'static>(&self) -> Option<&T> {
        self.inner.value.as_any().downcast_ref::<T>()
    }

    /// The item's stable ref.
    pub fn item_ref(&self) -> ItemRef {
        self.inner.item_ref
    }

    /// The owning worker, if any.
    pub fn owner(&self) -> Option<WorkerId> {
        self.inner.owner.as_ref().map(WorkerHandle::id)
    }

    pub(crate) fn owner_handle(&self) -> Option<&WorkerHandle> {
        self.inner.owner.as_ref()
    }

    /// Installs a one-shot liveness watch. Fires immediately if the item
    /// is already revoked.
    pub fn monitor(&self, tx: DownSender) -> MonitorToken {
        self.inner.hub.monitor(tx)
    }

    /// Releases a liveness watch.
    pub fn demonitor(&self, token: MonitorToken) {
        self.inner.hub.demonitor(token)
    }

    /// Terminates the item with the given reason, firing its monitors.
    /// Idempotent; the first reason wins.
    pub fn withdraw(&self, reason: impl Into<String>) {
        self.inner.hub.down(ExitReason::Revoked {
            reason: reason.into(),
        });
    }

    /// True once the item has been revoked.
    pub fn is_revoked(&self) -> bool {
        self.inner.hub.is_down()
    }

    /// Terminates the item with an already-shaped reason (owner death).
    pub(crate) fn revoke_with(&self, reason: ExitReason) {
        self.inner.hub.down(reason);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}, {:?}}}",
            self.inner.key, self.inner.value
        )
    }
}
