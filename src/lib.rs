//! # depvisor
//!
//! **Depvisor** is a dynamic dependency-injection and lifecycle
//! coordination engine for long-lived in-process workers.
//!
//! It keeps a population of workers alive that matches the currently
//! available set of keyed resource items: a worker starts automatically
//! when every input its factory requires becomes available, and is torn
//! down automatically when any input is revoked.
//!
//! ## Features
//!
//! | Area            | Description                                                        | Key types / traits                  |
//! |-----------------|--------------------------------------------------------------------|-------------------------------------|
//! | **Injector**    | Factory/item registries, incremental matching, cascading teardown. | [`Injector`], [`Factory`], [`Item`] |
//! | **Worker Host** | Spawning with a bounded init handshake, RPC, state dispatch.       | [`Host`], [`Worker`], [`StateFn`]   |
//! | **Monitoring**  | Uniform one-shot liveness watches for items and workers.           | [`Down`], [`MonitorToken`]          |
//! | **Events**      | Structured lifecycle event stream with subscriber fan-out.         | [`Event`], [`Subscribe`]            |
//! | **Errors**      | Typed errors with stable labels.                                   | [`EngineError`], [`RpcError`]       |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogWriter` subscriber
//!   _(demo/reference only)_.
//!
//! ```no_run
//! use async_trait::async_trait;
//! use depvisor::{
//!     BoxError, Config, Deps, EngineBuilder, Factory, Host, Msg, Reply, StartFn, StateFn,
//!     Step, Worker,
//! };
//!
//! // A worker module: async init plus named state functions.
//! struct Probe {
//!     port: u32,
//! }
//!
//! fn idle(reply: Reply, _msg: Msg, state: &mut Probe) -> Step<Probe> {
//!     reply.send(state.port);
//!     Step::NoChange
//! }
//!
//! #[async_trait]
//! impl Worker for Probe {
//!     const MODULE: &'static str = "probe";
//!     type Args = u32;
//!
//!     async fn init(port: u32) -> Result<(StateFn<Self>, Self), BoxError> {
//!         Ok((StateFn::new("idle", idle), Probe { port }))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = EngineBuilder::new(Config::default()).build();
//!     let injector = engine.start();
//!
//!     injector
//!         .add_factory(Factory::new(
//!             "probe",
//!             ["port"],
//!             StartFn::arc(|host: Host, deps: Deps| async move {
//!                 let port = *deps.get_as::<u32>("port").unwrap_or(&0);
//!                 host.spawn::<Probe>(port).await
//!             }),
//!         ))
//!         .await?;
//!
//!     // The probe starts as soon as its input exists...
//!     let item = injector.push_value("port", 7u32).await?;
//!
//!     // ...and stops when the input goes away.
//!     item.withdraw("unplugged");
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod config;
mod core;
mod error;
mod events;
mod factories;
mod host;
mod items;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{ActiveSnapshot, Engine, EngineBuilder, Injector, ItemSnapshot, Snapshot};
pub use config::Config;
pub use error::{EngineError, ExitReason, RpcError, SpawnError};
pub use events::{Bus, Event, EventKind};
pub use factories::{Deps, Factory, FactoryId, Start, StartFn};
pub use host::{
    BoxError, Down, DownSender, Host, MonitorToken, Msg, Reply, SpawnOptions, StateFn, Step,
    Worker, WorkerHandle, WorkerId, WorkerInfo,
};
pub use items::{Item, ItemRef, Key, Payload, Value};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logging subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
