//! # Structured events emitted by the engine.
//!
//! The event stream is the engine's observability surface: every state
//! change (factory added/removed, item pushed/revoked, child
//! starting/stopping, RPC failure) is published as an [`Event`] on the
//! [`Bus`] and fanned out to subscribers.
//!
//! - [`Event`] carries `{seq, at, kind}` plus optional metadata fields set
//!   through builder-style `with_*` methods.
//! - [`EventKind`] classifies the event.
//! - [`Bus`] is a broadcast channel wrapper with `publish`/`subscribe`.
//!
//! ## Ordering guarantees
//! Every event has a globally unique, monotonically increasing sequence
//! number (`seq`). Given the same total order of external operations, the
//! engine emits an identical event stream (modulo timestamps).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
