//! # Event subscribers.
//!
//! Subscribers are the extension point for reacting to engine events:
//! log sinks, metrics, test recorders. Each subscriber is driven by a
//! dedicated worker task fed from a bounded queue, so a slow subscriber
//! never blocks the injector or other subscribers.
//!
//! ## Architecture
//! ```text
//! Injector / Host ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                                │
//!                                             ┌──────────────────┼─────────┐
//!                                             ▼                  ▼         ▼
//!                                        [queue S1]         [queue S2]   [...]
//!                                             │                  │
//!                                        worker S1          worker S2
//!                                        on_event()         on_event()
//! ```

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
