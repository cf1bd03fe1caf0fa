//! # Engine: the public facade.
//!
//! The [`Engine`] owns the runtime components (event bus, subscriber
//! fan-out, worker host, runtime token) and wires the injector loop.
//!
//! - [`Engine::start`] spawns the injector and returns the [`Injector`]
//!   API handle
//! - [`Engine::host`] exposes the worker host surface (spawn/rpc)
//! - [`Engine::subscribe`] taps the raw event stream
//! - [`Engine::shutdown`] performs graceful shutdown with a grace period
//!
//! ## Shutdown timeline
//! ```text
//! shutdown()
//!   → injector stops every active entry (ChildStopping/ChildStopped)
//!   → runtime token cancelled (linked workers terminate)
//!   → wait up to Config::grace for worker termination
//!   → Ok(()) | Err(GraceExceeded{grace, stuck})
//! ```
//!
//! ## Rules
//! - An injector-task panic is fatal to the engine: a watchdog cancels
//!   the runtime token, taking the worker population down with it. The
//!   injector's invariants do not survive its loop.
//! - `start` is idempotent; every call returns a handle to the same loop.

use std::sync::{Arc, OnceLock};

use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::EngineError;
use crate::events::{Bus, Event};
use crate::host::Host;
use crate::subscribers::SubscriberSet;

use super::injector::{Injector, InjectorCore};

/// The assembled engine runtime. Built by
/// [`EngineBuilder`](super::builder::EngineBuilder).
pub struct Engine {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    host: Host,
    runtime: CancellationToken,
    injector: OnceLock<Injector>,
}

impl Engine {
    pub(crate) fn new(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        host: Host,
        runtime: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            host,
            runtime,
            injector: OnceLock::new(),
        }
    }

    /// Starts the injector loop (once) and returns the API handle.
    pub fn start(&self) -> Injector {
        self.injector
            .get_or_init(|| {
                self.spawn_subscriber_listener();

                let (tx, cmd_rx) = mpsc::unbounded_channel();
                let (core, down_rx) = InjectorCore::new(self.bus.clone(), self.host.clone());
                let runtime = self.runtime.clone();
                let join = tokio::spawn(core.run(cmd_rx, down_rx, runtime.clone()));

                // Loss of the injector is loss of its invariants: take the
                // whole engine down with it.
                tokio::spawn(async move {
                    if join.await.is_err() {
                        eprintln!("[depvisor] injector task panicked; cancelling runtime");
                        runtime.cancel();
                    }
                });

                Injector::new(tx)
            })
            .clone()
    }

    /// The worker host surface.
    pub fn host(&self) -> Host {
        self.host.clone()
    }

    /// Taps the raw event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Graceful shutdown: stop all active workers, then wait up to
    /// `Config::grace` for them to terminate.
    ///
    /// Returns `Err(GraceExceeded)` naming the stuck workers' modules if
    /// the grace period expires.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let handles = match self.injector.get() {
            Some(inj) => inj.shutdown().await.unwrap_or_default(),
            None => Vec::new(),
        };
        self.runtime.cancel();

        let grace = self.cfg.grace;
        let all_terminated = async {
            for handle in &handles {
                handle.terminated().await;
            }
        };
        if time::timeout(grace, all_terminated).await.is_err() {
            let stuck = handles
                .iter()
                .filter(|h| !h.is_terminated())
                .map(|h| h.info().module.to_string())
                .collect();
            return Err(EngineError::GraceExceeded { grace, stuck });
        }
        Ok(())
    }

    /// Spawns the background task that feeds bus events to subscribers.
    fn spawn_subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let runtime = self.runtime.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = runtime.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit_arc(Arc::new(ev)),
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        });
    }
}
