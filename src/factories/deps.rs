//! # Dependency list handed to factory start recipes.
//!
//! [`Deps`] is a key→value sequence in the declared order of the factory's
//! `requires` list. Duplicated keys are aggregated as multiple entries in
//! position order; `get` returns the first, `all` returns every entry for
//! a key.

use crate::items::{Item, Key, Value};

/// Ordered dependency list for one worker instantiation.
#[derive(Clone, Debug)]
pub struct Deps {
    entries: Vec<(Key, Value)>,
}

impl Deps {
    pub(crate) fn from_items(items: &[Item]) -> Self {
        Self {
            entries: items
                .iter()
                .map(|i| (i.key().clone(), i.value().clone()))
                .collect(),
        }
    }

    /// The first value for `key`, in declared order.
    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        let key = key.into();
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// The first value for `key`, downcast to a concrete type.
    pub fn get_as<T: 'static>(&self, key: impl Into<Key>) -> Option<&T> {
        self.get(key).and_then(|v| v.as_any().downcast_ref::<T>())
    }

    /// Every value for `key`, in declared order.
    pub fn all<'a>(&'a self, key: impl Into<Key>) -> impl Iterator<Item = &'a Value> {
        let key = key.into();
        self.entries
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// All entries in declared order.
    pub fn iter(&self) -> std::slice::Iter<'_, (Key, Value)> {
        self.entries.iter()
    }

    /// Number of entries (equals the factory's `requires` length).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for factories with no requirements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicated_keys_aggregate_in_order() {
        let items = vec![
            Item::new("port", 1u32),
            Item::new("port", 2u32),
            Item::new("speed", 9u32),
        ];
        let deps = Deps::from_items(&items);

        assert_eq!(deps.len(), 3);
        assert_eq!(deps.get_as::<u32>("port"), Some(&1));
        let ports: Vec<&u32> = deps
            .all("port")
            .filter_map(|v| v.as_any().downcast_ref())
            .collect();
        assert_eq!(ports, vec![&1, &2]);
        assert_eq!(deps.get_as::<u32>("speed"), Some(&9));
        assert!(deps.get("missing").is_none());
    }
}
