//! # Builder wiring the engine's runtime components.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::events::Bus;
use crate::host::Host;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::engine::Engine;

/// Builder for constructing an [`Engine`].
///
/// ## Example
/// ```no_run
/// use depvisor::{Config, EngineBuilder};
///
/// # async fn build() {
/// let engine = EngineBuilder::new(Config::default()).build();
/// let injector = engine.start();
/// # let _ = injector;
/// # }
/// ```
pub struct EngineBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EngineBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive engine events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the engine. Must be called inside a tokio runtime (the
    /// subscriber workers are spawned here).
    pub fn build(self) -> Engine {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let runtime = CancellationToken::new();
        let host = Host::new(&self.cfg, bus.clone(), runtime.clone());

        Engine::new(self.cfg, bus, subs, host, runtime)
    }
}
