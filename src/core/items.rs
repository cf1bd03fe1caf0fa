//! # Item table: multi-map from key to live items.
//!
//! Per-key sequences keep insertion order, which is what makes the
//! matcher's enumeration deterministic given the same push history.

use std::collections::HashMap;

use crate::host::WorkerId;
use crate::items::{Item, ItemRef, Key};

/// Multi-map `key → ordered live items`, with a ref index for removal.
pub(crate) struct ItemTable {
    map: HashMap<Key, Vec<Item>>,
    refs: HashMap<ItemRef, Key>,
}

impl ItemTable {
    pub(crate) fn new() -> Self {
        Self {
            map: HashMap::new(),
            refs: HashMap::new(),
        }
    }

    /// Appends an item under its key. Returns `false` (no change) if the
    /// ref is already present.
    pub(crate) fn insert(&mut self, item: Item) -> bool {
        if self.refs.contains_key(&item.item_ref()) {
            return false;
        }
        self.refs.insert(item.item_ref(), item.key().clone());
        self.map.entry(item.key().clone()).or_default().push(item);
        true
    }

    /// Removes an item by ref. Emptied keys are deleted.
    pub(crate) fn remove(&mut self, item_ref: ItemRef) -> Option<Item> {
        let key = self.refs.remove(&item_ref)?;
        let bucket = self.map.get_mut(&key)?;
        let pos = bucket.iter().position(|i| i.item_ref() == item_ref)?;
        let item = bucket.remove(pos);
        if bucket.is_empty() {
            self.map.remove(&key);
        }
        Some(item)
    }

    /// The current ordered sequence for a key (empty if absent).
    pub(crate) fn values(&self, key: &Key) -> &[Item] {
        self.map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if the ref is present.
    pub(crate) fn contains_ref(&self, item_ref: ItemRef) -> bool {
        self.refs.contains_key(&item_ref)
    }

    /// All items owned by the given worker.
    pub(crate) fn owned_by(&self, worker: WorkerId) -> Vec<Item> {
        let mut owned: Vec<Item> = self
            .map
            .values()
            .flatten()
            .filter(|i| i.owner() == Some(worker))
            .cloned()
            .collect();
        owned.sort_by_key(Item::item_ref);
        owned
    }

    /// All live items, ordered by ref.
    pub(crate) fn all(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.map.values().flatten().cloned().collect();
        items.sort_by_key(Item::item_ref);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_insertion_order_and_ignores_duplicate_refs() {
        let mut table = ItemTable::new();
        let a = Item::new("x", 1u32);
        let b = Item::new("x", 2u32);

        assert!(table.insert(a.clone()));
        assert!(table.insert(b.clone()));
        assert!(!table.insert(a.clone()), "duplicate ref is a no-op");

        let key = Key::from("x");
        let refs: Vec<_> = table.values(&key).iter().map(Item::item_ref).collect();
        assert_eq!(refs, vec![a.item_ref(), b.item_ref()]);
    }

    #[test]
    fn removing_last_item_deletes_the_key() {
        let mut table = ItemTable::new();
        let a = Item::new("x", 1u32);
        table.insert(a.clone());

        assert!(table.remove(a.item_ref()).is_some());
        assert!(table.values(&Key::from("x")).is_empty());
        assert!(table.all().is_empty());
        assert!(table.remove(a.item_ref()).is_none());
    }

    #[test]
    fn owned_by_filters_on_owner() {
        let table = {
            let mut t = ItemTable::new();
            t.insert(Item::new("x", 1u32));
            t
        };
        // no owner recorded for plain items
        assert!(table.owned_by(crate::host::WorkerId::next()).is_empty());
    }
}
