//! # Matching: from required keys to candidate argument tuples.
//!
//! For a factory with `requires = [k1, …, kn]` the candidate set is the
//! Cartesian product of the item-table columns `values(k1) × … ×
//! values(kn)`, enumerated in lexicographic order of the position-wise
//! indices (the rightmost position varies fastest).
//!
//! ## Rules
//! - Any empty column ⇒ empty product ⇒ nothing starts.
//! - `requires = []` ⇒ exactly one empty tuple (singleton instantiation).
//! - Duplicate keys yield tuples where the same item may appear at
//!   several positions.
//! - Enumeration is deterministic given the same push history, because
//!   each column preserves insertion order.
//!
//! Filtering against the active set is the caller's concern; this module
//! only enumerates.

use crate::items::{Item, Key};

use super::items::ItemTable;

/// Enumerates every candidate tuple for the given required keys.
pub(crate) fn candidates(requires: &[Key], table: &ItemTable) -> Vec<Vec<Item>> {
    let mut tuples: Vec<Vec<Item>> = vec![Vec::with_capacity(requires.len())];
    for key in requires {
        let column = table.values(key);
        if column.is_empty() {
            return Vec::new();
        }
        let mut grown = Vec::with_capacity(tuples.len() * column.len());
        for prefix in &tuples {
            for item in column {
                let mut tuple = prefix.clone();
                tuple.push(item.clone());
                grown.push(tuple);
            }
        }
        tuples = grown;
    }
    tuples
}
