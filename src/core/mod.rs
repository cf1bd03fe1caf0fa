//! Runtime core: the injector and its bookkeeping.
//!
//! This module contains the embedded implementation of the depvisor
//! runtime. The public API re-exported from here is [`Engine`],
//! [`EngineBuilder`], [`Injector`], and the snapshot types; everything
//! else is an internal building block the engine wires together.
//!
//! ## Files & responsibilities
//! - **engine.rs**: public facade; owns Bus, SubscriberSet, Host, and the
//!   runtime token; starts the injector loop; drives graceful shutdown.
//! - **builder.rs**: constructs the engine's runtime components.
//! - **injector.rs**: the serialized coordinator — command handling,
//!   matching, cascades, and the liveness channel.
//! - **matcher.rs**: Cartesian-product tuple enumeration.
//! - **factories.rs / items.rs / active.rs**: insertion-ordered
//!   bookkeeping (factory registry, item table, active set).
//!
//! ## Event data-plane (who publishes what)
//! - **Injector** → `FactoryAdded/FactoryRemoved`, `ItemPushed/ItemRevoked`,
//!   `ChildStarting/ChildStarted/ChildStopping/ChildStopped`,
//!   `ShutdownRequested`
//! - **WorkerHandle** → `RpcFailed`
//! - **SubscriberSet** → `SubscriberOverflow`, `SubscriberPanicked`
//!
//! ## Wiring (module-level flow)
//! ```text
//! Application code
//!   └─ builds factories/items, creates Engine, calls Engine::start()
//!
//! Engine::start()
//!   ├─ spawn subscriber listener  (Bus → SubscriberSet)
//!   ├─ spawn InjectorCore::run()
//!   └─ return Injector handle
//!
//! Injector handle ──► command channel ──► InjectorCore
//!                                             │ matching → Host::spawn
//!                                             │ monitors → Down channel
//!                                             ▼
//!                                       Bus (broadcast)
//! ```

mod active;
mod builder;
mod engine;
mod factories;
mod injector;
mod items;
mod matcher;

pub use builder::EngineBuilder;
pub use engine::Engine;
pub use injector::{ActiveSnapshot, Injector, ItemSnapshot, Snapshot};
