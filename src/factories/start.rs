//! # Start recipe: how a factory turns dependencies into a worker.
//!
//! [`Start`] is the async recipe the injector invokes once a factory's
//! requirements are satisfied. [`StartFn`] wraps a closure
//! `Fn(Host, Deps) -> Future`, producing a fresh future per invocation —
//! extra recipe arguments are simply captured by the closure.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use depvisor::{Deps, Host, StartFn, Start};
//!
//! # struct Probe;
//! # #[async_trait::async_trait]
//! # impl depvisor::Worker for Probe {
//! #     const MODULE: &'static str = "probe";
//! #     type Args = u32;
//! #     async fn init(port: u32) -> Result<(depvisor::StateFn<Self>, Self), depvisor::BoxError> {
//! #         let _ = port;
//! #         Ok((depvisor::StateFn::new("idle", |_r, _m, _s| depvisor::Step::NoChange), Probe))
//! #     }
//! # }
//! let start: Arc<dyn Start> = StartFn::arc(|host: Host, deps: Deps| async move {
//!     let port = *deps.get_as::<u32>("port").unwrap_or(&0);
//!     host.spawn::<Probe>(port).await
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SpawnError;
use crate::host::{Host, WorkerHandle};

use super::deps::Deps;

/// Recipe invoked to spawn a worker for one satisfied argument tuple.
#[async_trait]
pub trait Start: Send + Sync + 'static {
    /// Spawns the worker for this dependency list.
    ///
    /// On error the tuple is logged as stopped and not retried; it never
    /// enters the active set.
    async fn start(&self, host: Host, deps: Deps) -> Result<WorkerHandle, SpawnError>;
}

/// Closure-backed start recipe.
///
/// Wraps a closure that *creates* a new future per invocation.
pub struct StartFn<F> {
    f: F,
}

impl<F> StartFn<F> {
    /// Creates a new closure-backed recipe.
    ///
    /// Prefer [`StartFn::arc`] when you immediately need an
    /// `Arc<dyn Start>`.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the recipe and returns it as a shared trait object.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Start for StartFn<F>
where
    F: Fn(Host, Deps) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<WorkerHandle, SpawnError>> + Send + 'static,
{
    async fn start(&self, host: Host, deps: Deps) -> Result<WorkerHandle, SpawnError> {
        (self.f)(host, deps).await
    }
}
