//! # Items: keyed, ref-identified units of state.
//!
//! An [`Item`] binds an opaque [`Key`] to an opaque payload ([`Value`]).
//! Items are pushed into the injector and revoked exactly once — by
//! explicit [`Item::withdraw`] or by the death of their owning worker.
//! Each item carries the same monitoring primitive workers do, so the
//! injector observes item and worker deaths uniformly.

mod item;

pub use item::{Item, ItemRef, Key, Payload, Value};
