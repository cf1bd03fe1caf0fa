//! # Injector: the serialized coordinator.
//!
//! The injector owns the factory registry, the item table, and the active
//! set, and is the only task that mutates them. Commands and liveness
//! notifications are interleaved on one event loop; matching, spawning,
//! and teardown all complete between two receives, so every decision
//! observes a consistent snapshot.
//!
//! ## Architecture
//! ```text
//!        Injector (handle) ──► commands ──┐
//!                                         ▼
//!                            ┌── InjectorCore::run() ──┐
//!    monitors fire Down ───► │  select! loop           │
//!                            │    ├─ AddFactory  → validate, register, match
//!                            │    ├─ RemoveFactory → unregister (workers untouched)
//!                            │    ├─ Push        → guard, insert, monitor, match
//!                            │    ├─ item_down   → revoke, cascade-stop dependents
//!                            │    └─ worker_down → drop entry, revoke owned items
//!                            └─────────────────────────┘
//! ```
//!
//! ## Rules
//! - A spawn handshake blocks the loop (bounded, default 500 ms): the
//!   active set only ever contains workers that passed init.
//! - Item revocation never starts workers; a push never stops them.
//! - Before a cascade stops a worker, its monitor is released — the
//!   later worker-down for the already-removed entry is ignored.
//! - A crashed worker is not restarted: re-matching happens only on
//!   push/add events.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, ExitReason};
use crate::events::{Bus, Event, EventKind};
use crate::factories::{Deps, Factory, FactoryId};
use crate::host::{Down, DownSender, Host, MonitorToken, WorkerHandle, WorkerId};
use crate::items::{Item, ItemRef, Key, Payload};

use super::active::{ActiveEntry, ActiveSet};
use super::factories::FactoryRegistry;
use super::items::ItemTable;
use super::matcher;

/// Commands accepted by the injector loop. Every command is acknowledged
/// through its oneshot so callers observe completed state transitions.
pub(crate) enum Command {
    AddFactory {
        factory: Factory,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    RemoveFactory {
        id: FactoryId,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Push {
        item: Item,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<Vec<WorkerHandle>>,
    },
}

/// Cloneable handle to a running injector.
///
/// All operations are processed strictly serially, in send order per
/// caller; each returns once the injector finished the transition
/// (including any spawns it triggered).
#[derive(Clone)]
pub struct Injector {
    tx: mpsc::UnboundedSender<Command>,
}

impl Injector {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .map_err(|_| EngineError::NotRunning)?;
        rx.await.map_err(|_| EngineError::NotRunning)
    }

    /// Registers a factory and starts every currently satisfiable tuple.
    pub async fn add_factory(&self, factory: Factory) -> Result<(), EngineError> {
        self.request(|reply| Command::AddFactory { factory, reply })
            .await?
    }

    /// Removes a factory. Workers it already produced keep running.
    pub async fn remove_factory(&self, id: impl Into<FactoryId>) -> Result<(), EngineError> {
        let id = id.into();
        self.request(|reply| Command::RemoveFactory { id, reply })
            .await?
    }

    /// Pushes an item, re-matching the factories that depend on its key.
    pub async fn push(&self, item: Item) -> Result<(), EngineError> {
        self.request(|reply| Command::Push { item, reply }).await?
    }

    /// Creates an item owned by no one, pushes it, and returns the handle.
    pub async fn push_value(
        &self,
        key: impl Into<Key>,
        value: impl Payload,
    ) -> Result<Item, EngineError> {
        let item = Item::new(key, value);
        self.push(item.clone()).await?;
        Ok(item)
    }

    /// Consistent snapshot of registries and the active set.
    pub async fn snapshot(&self) -> Result<Snapshot, EngineError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub(crate) async fn shutdown(&self) -> Result<Vec<WorkerHandle>, EngineError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

/// Point-in-time view of the injector's bookkeeping.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Registered factory ids, in registration order.
    pub factories: Vec<FactoryId>,
    /// Live items, ordered by ref.
    pub items: Vec<ItemSnapshot>,
    /// Active entries, in start order.
    pub active: Vec<ActiveSnapshot>,
}

/// One live item in a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct ItemSnapshot {
    pub key: Key,
    pub item_ref: ItemRef,
}

/// One active entry in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSnapshot {
    pub factory: FactoryId,
    pub tuple: Vec<ItemRef>,
    pub worker: WorkerId,
}

/// What a monitor token is watching.
enum Monitored {
    Item(ItemRef),
    Worker(WorkerId),
}

/// The injector's single-task state. Owned exclusively by the loop.
pub(crate) struct InjectorCore {
    bus: Bus,
    host: Host,
    factories: FactoryRegistry,
    items: ItemTable,
    active: ActiveSet,
    monitors: HashMap<MonitorToken, Monitored>,
    down_tx: DownSender,
}

impl InjectorCore {
    /// Creates the core and the liveness channel its monitors feed.
    pub(crate) fn new(bus: Bus, host: Host) -> (Self, mpsc::UnboundedReceiver<Down>) {
        let (down_tx, down_rx) = mpsc::unbounded_channel();
        let core = Self {
            bus,
            host,
            factories: FactoryRegistry::new(),
            items: ItemTable::new(),
            active: ActiveSet::new(),
            monitors: HashMap::new(),
            down_tx,
        };
        (core, down_rx)
    }

    /// Runs the loop until shutdown or runtime cancellation.
    pub(crate) async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut down_rx: mpsc::UnboundedReceiver<Down>,
        runtime: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = runtime.cancelled() => break,
                down = down_rx.recv() => match down {
                    Some(d) => self.handle_down(d),
                    None => break,
                },
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    }

    /// Dispatches one command. Returns `true` on shutdown.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::AddFactory { factory, reply } => {
                let res = self.add_factory(factory).await;
                let _ = reply.send(res);
            }
            Command::RemoveFactory { id, reply } => {
                let _ = reply.send(self.remove_factory(&id));
            }
            Command::Push { item, reply } => {
                let res = self.push(item).await;
                let _ = reply.send(res);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(self.shutdown());
                return true;
            }
        }
        false
    }

    async fn add_factory(&mut self, factory: Factory) -> Result<(), EngineError> {
        factory.validate()?;
        self.factories.add(factory.clone())?;
        self.bus.publish(
            Event::now(EventKind::FactoryAdded).with_factory(factory.id().clone()),
        );
        self.match_factory(&factory).await;
        Ok(())
    }

    fn remove_factory(&mut self, id: &FactoryId) -> Result<(), EngineError> {
        self.factories.remove(id)?;
        self.bus
            .publish(Event::now(EventKind::FactoryRemoved).with_factory(id.clone()));
        Ok(())
    }

    async fn push(&mut self, item: Item) -> Result<(), EngineError> {
        // A withdrawn item never reappears; a duplicate ref is a no-op.
        if item.is_revoked() || self.items.contains_ref(item.item_ref()) {
            return Ok(());
        }
        self.check_self_injection(&item)?;

        let token = item.monitor(self.down_tx.clone());
        self.monitors.insert(token, Monitored::Item(item.item_ref()));
        if let Some(owner) = item.owner_handle() {
            // Owner death revokes the item: watch the owner as well. Fires
            // immediately if the owner is already gone.
            let owner_token = owner.monitor(self.down_tx.clone());
            self.monitors.insert(owner_token, Monitored::Worker(owner.id()));
        }
        self.items.insert(item.clone());
        self.bus.publish(
            Event::now(EventKind::ItemPushed)
                .with_key(item.key().clone())
                .with_value(format!("{:?}", item.value()))
                .with_item(item.item_ref()),
        );

        for factory in self.factories.depending_on(item.key()) {
            self.match_factory(&factory).await;
        }
        Ok(())
    }

    /// Rejects pushes that would feed a worker's own matching.
    fn check_self_injection(&self, item: &Item) -> Result<(), EngineError> {
        let Some(owner) = item.owner() else {
            return Ok(());
        };
        let Some(entry) = self.active.find_by_worker(owner) else {
            return Ok(());
        };
        let Some(factory) = self.factories.get(&entry.factory) else {
            return Ok(());
        };
        if factory.requires().contains(item.key()) {
            return Err(EngineError::SelfInjection {
                key: item.key().clone(),
                worker: owner,
            });
        }
        Ok(())
    }

    /// Starts every satisfiable tuple of one factory that is not already
    /// active.
    async fn match_factory(&mut self, factory: &Factory) {
        for tuple in matcher::candidates(factory.requires(), &self.items) {
            let refs: Vec<ItemRef> = tuple.iter().map(Item::item_ref).collect();
            if self.active.contains(factory.id(), &refs) {
                continue;
            }
            if tuple.iter().any(|i| i.is_revoked()) {
                // A revocation is already queued for this item.
                continue;
            }
            self.start_tuple(factory, tuple, refs).await;
        }
    }

    async fn start_tuple(&mut self, factory: &Factory, tuple: Vec<Item>, refs: Vec<ItemRef>) {
        self.bus.publish(
            Event::now(EventKind::ChildStarting)
                .with_factory(factory.id().clone())
                .with_tuple(refs.clone())
                .with_value(format!("{tuple:?}")),
        );

        let deps = Deps::from_items(&tuple);
        match factory.start().start(self.host.clone(), deps).await {
            Ok(worker) => {
                let token = worker.monitor(self.down_tx.clone());
                self.monitors.insert(token, Monitored::Worker(worker.id()));
                self.bus.publish(
                    Event::now(EventKind::ChildStarted)
                        .with_factory(factory.id().clone())
                        .with_tuple(refs.clone())
                        .with_worker(worker.id()),
                );
                self.active.insert(ActiveEntry {
                    factory: factory.id().clone(),
                    refs,
                    worker,
                    token,
                });
            }
            Err(e) => {
                // Not retried; the tuple never enters the active set. A
                // later push of the same key recomputes matching and may
                // re-attempt.
                self.bus.publish(
                    Event::now(EventKind::ChildStopped)
                        .with_factory(factory.id().clone())
                        .with_tuple(refs)
                        .with_error(e.to_string()),
                );
            }
        }
    }

    fn handle_down(&mut self, down: Down) {
        match self.monitors.remove(&down.token) {
            // Demonitored in a cascade before the notification drained.
            None => {}
            Some(Monitored::Item(item_ref)) => self.item_down(item_ref, down.reason),
            Some(Monitored::Worker(worker)) => self.worker_down(worker, down.reason),
        }
    }

    /// An item died: remove it and cascade-stop every dependent entry
    /// with the same reason. Other factories are untouched; revocation
    /// never starts workers.
    fn item_down(&mut self, item_ref: ItemRef, reason: ExitReason) {
        let Some(item) = self.items.remove(item_ref) else {
            return;
        };
        self.bus.publish(
            Event::now(EventKind::ItemRevoked)
                .with_key(item.key().clone())
                .with_value(format!("{:?}", item.value()))
                .with_item(item_ref)
                .with_error(reason.to_string()),
        );
        for entry in self.active.remove_involving(item_ref) {
            self.stop_entry(entry, reason.clone());
        }
    }

    /// A worker died on its own: drop the entry (no restart) and revoke
    /// the items it owned.
    fn worker_down(&mut self, worker: WorkerId, reason: ExitReason) {
        if let Some(entry) = self.active.remove_by_worker(worker) {
            self.bus.publish(
                Event::now(EventKind::ChildStopped)
                    .with_factory(entry.factory.clone())
                    .with_tuple(entry.refs.clone())
                    .with_worker(worker)
                    .with_error(reason.to_string()),
            );
        }
        for item in self.items.owned_by(worker) {
            // The revocations arrive as item_down notifications and
            // cascade from there, in monitor-fire order.
            item.revoke_with(ExitReason::Revoked {
                reason: format!("owner {worker} exited: {reason}"),
            });
        }
    }

    /// Tears down the entry: release the worker monitor first so the
    /// worker-down for the removed entry is ignored, then request the
    /// asynchronous stop.
    fn stop_entry(&mut self, entry: ActiveEntry, reason: ExitReason) {
        self.bus.publish(
            Event::now(EventKind::ChildStopping)
                .with_factory(entry.factory.clone())
                .with_tuple(entry.refs.clone())
                .with_worker(entry.worker.id()),
        );
        self.monitors.remove(&entry.token);
        entry.worker.demonitor(entry.token);
        entry.worker.stop(reason.clone());
        self.bus.publish(
            Event::now(EventKind::ChildStopped)
                .with_factory(entry.factory)
                .with_tuple(entry.refs)
                .with_worker(entry.worker.id())
                .with_error(reason.to_string()),
        );
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            factories: self.factories.ids(),
            items: self
                .items
                .all()
                .into_iter()
                .map(|i| ItemSnapshot {
                    key: i.key().clone(),
                    item_ref: i.item_ref(),
                })
                .collect(),
            active: self
                .active
                .iter()
                .map(|e| ActiveSnapshot {
                    factory: e.factory.clone(),
                    tuple: e.refs.clone(),
                    worker: e.worker.id(),
                })
                .collect(),
        }
    }

    /// Stops every active entry and returns the handles so the engine can
    /// wait for them within its grace period.
    fn shutdown(&mut self) -> Vec<WorkerHandle> {
        self.bus.publish(Event::now(EventKind::ShutdownRequested));
        let mut handles = Vec::with_capacity(self.active.len());
        for entry in self.active.drain() {
            handles.push(entry.worker.clone());
            self.stop_entry(entry, ExitReason::Canceled);
        }
        handles
    }
}
