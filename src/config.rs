//! # Global engine configuration.
//!
//! [`Config`] centralizes the runtime settings: event-bus capacity, the
//! worker init handshake timeout, and the graceful-shutdown grace period.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use depvisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.spawn_timeout = Duration::from_millis(250);
//! cfg.grace = Duration::from_secs(5);
//!
//! assert_eq!(cfg.bus_capacity, 1024);
//! ```

use std::time::Duration;

/// Global configuration for the engine runtime.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus channel. Oldest events are dropped for
    /// lagging subscribers when the channel is full.
    pub bus_capacity: usize,
    /// Maximum time a worker's `init` may take before the spawn fails and
    /// the nascent worker is terminated.
    pub spawn_timeout: Duration,
    /// Maximum time to wait for workers to stop during graceful shutdown.
    pub grace: Duration,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `bus_capacity = 1024`
    /// - `spawn_timeout = 500ms`
    /// - `grace = 30s`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            spawn_timeout: Duration::from_millis(500),
            grace: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Bus capacity clamped to at least one slot.
    pub(crate) fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}
