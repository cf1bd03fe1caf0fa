//! # Worker Host: the supervision primitive workers run on.
//!
//! The host spawns workers with a bounded init handshake, routes messages
//! to state-function callbacks, and makes every worker monitorable.
//!
//! ## Files & responsibilities
//! - **worker.rs**: the [`Worker`] module contract (`init`/`started`/
//!   `stopped`), state-function dispatch ([`StateFn`], [`Step`]), the
//!   [`Reply`] continuation.
//! - **handle.rs**: [`WorkerHandle`] — mailbox, identity metadata, stop
//!   token, `rpc`/`cast`, system messages.
//! - **monitor.rs**: one-shot, token-correlated liveness watches
//!   ([`Down`], [`MonitorToken`]), uniform for workers and items.
//! - **host.rs**: [`Host::spawn`] — the handshake — and the per-worker
//!   message loop.
//!
//! ## Wiring (module-level flow)
//! ```text
//! Host::spawn::<W>(args)
//!   ├─ spawn worker task ──► W::init(args) ──► ready(ack)
//!   │                             │ timeout (default 500 ms) → abort task
//!   ▼                             ▼
//! WorkerHandle              loop {
//!   ├─ rpc / cast ──────────►   state_fn(reply, msg, &mut data)
//!   ├─ sys_info / trace ────►   (system messages bypass callbacks)
//!   └─ stop(reason) ────────►   break
//!                           }
//!                             stopped(reason)  [best-effort]
//!                             monitors fire Down{token, reason}
//! ```
//!
//! ## Rules
//! - Messages for one worker are processed strictly sequentially.
//! - Callback panics terminate the worker with `ExitReason::Panic`.
//! - The host never restarts workers; restart policy belongs to callers.

mod handle;
mod host;
mod monitor;
mod worker;

pub use handle::{WorkerHandle, WorkerId, WorkerInfo};
pub use host::{Host, SpawnOptions};
pub use monitor::{Down, DownSender, MonitorToken};
pub use worker::{BoxError, Msg, Reply, StateFn, Step, Worker};

pub(crate) use monitor::MonitorHub;
