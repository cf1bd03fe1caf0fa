//! # Active set: running instantiations keyed by (factory id, tuple).
//!
//! Vec-backed and insertion-ordered so that cascading teardown stops
//! dependents in the order they were started — the event stream stays
//! reproducible.
//!
//! ## Invariants
//! - At most one entry per `(factory id, tuple)` key.
//! - No two entries share a worker handle.

use crate::factories::FactoryId;
use crate::host::{MonitorToken, WorkerHandle, WorkerId};
use crate::items::ItemRef;

/// One running instantiation.
pub(crate) struct ActiveEntry {
    /// The factory that produced it. Survives factory removal.
    pub(crate) factory: FactoryId,
    /// Pointwise item refs of the argument tuple.
    pub(crate) refs: Vec<ItemRef>,
    /// The running worker.
    pub(crate) worker: WorkerHandle,
    /// The injector's monitor token for the worker.
    pub(crate) token: MonitorToken,
}

/// Insertion-ordered map of active entries.
pub(crate) struct ActiveSet {
    entries: Vec<ActiveEntry>,
}

impl ActiveSet {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// True if the `(factory, tuple)` key is already active.
    pub(crate) fn contains(&self, factory: &FactoryId, refs: &[ItemRef]) -> bool {
        self.entries
            .iter()
            .any(|e| e.factory == *factory && e.refs == refs)
    }

    pub(crate) fn insert(&mut self, entry: ActiveEntry) {
        debug_assert!(!self.contains(&entry.factory, &entry.refs));
        self.entries.push(entry);
    }

    /// Removes and returns every entry whose tuple contains the item,
    /// preserving start order.
    pub(crate) fn remove_involving(&mut self, item_ref: ItemRef) -> Vec<ActiveEntry> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.refs.contains(&item_ref) {
                removed.push(entry);
            } else {
                kept.push(entry);
            }
        }
        self.entries = kept;
        removed
    }

    /// Removes the entry owned by the given worker, if any.
    pub(crate) fn remove_by_worker(&mut self, worker: WorkerId) -> Option<ActiveEntry> {
        let pos = self.entries.iter().position(|e| e.worker.id() == worker)?;
        Some(self.entries.remove(pos))
    }

    /// The entry owned by the given worker, if any.
    pub(crate) fn find_by_worker(&self, worker: WorkerId) -> Option<&ActiveEntry> {
        self.entries.iter().find(|e| e.worker.id() == worker)
    }

    /// Removes and returns all entries in start order.
    pub(crate) fn drain(&mut self) -> Vec<ActiveEntry> {
        self.entries.drain(..).collect()
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, ActiveEntry> {
        self.entries.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
