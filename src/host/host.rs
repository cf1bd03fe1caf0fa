//! # Spawning and the per-worker message loop.
//!
//! [`Host::spawn`] runs the bounded init handshake: the worker task starts,
//! runs `Worker::init`, and acknowledges readiness through a oneshot; the
//! caller blocks on that acknowledgement up to the handshake timeout
//! (default 500 ms). On timeout the nascent task is aborted and the spawn
//! fails — a handle is only ever returned for a worker that passed init.
//!
//! ## Handshake flow
//! ```text
//! spawn::<W>(args)
//!   ├─► tokio::spawn(worker_loop::<W>)
//!   │         ├─► W::init(args)    ──ok──► ready(Ok) ──► started() ──► loop
//!   │         │                    ──err─► ready(Err), monitors fire
//!   │         │                    ──panic► ready(Err), monitors fire
//!   └─► timeout(spawn_timeout, ready)
//!             ├─► Ok(Ok)  → WorkerHandle
//!             ├─► Ok(Err) → SpawnError::InitFailed
//!             └─► Elapsed → abort task, SpawnError::Timeout
//! ```
//!
//! ## Rules
//! - Exactly one death notification per worker, whatever the path.
//! - `stopped` is best-effort: it runs on every exit except an aborted
//!   handshake, and its own panics are swallowed.
//! - Uncaught panics in callbacks terminate the worker with
//!   `ExitReason::Panic { details }`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{ExitReason, SpawnError};
use crate::events::Bus;

use super::handle::{Envelope, SysMsg, WorkerHandle, WorkerShared};
use super::worker::{Step, Worker};

/// Options for a single spawn.
#[derive(Default)]
pub struct SpawnOptions {
    /// Handshake timeout override; `None` uses the host default.
    pub timeout: Option<Duration>,
    /// Optional linked token: when it fires, the worker terminates with
    /// `ExitReason::Canceled`. Ties a worker's lifetime to a caller scope.
    pub link: Option<CancellationToken>,
}

/// The worker host: spawns workers and owns their runtime linkage.
///
/// Cloning is cheap; all clones share the same bus and runtime token.
/// Every spawned worker is linked to the host's runtime token, so engine
/// shutdown cancels the whole population.
#[derive(Clone)]
pub struct Host {
    spawn_timeout: Duration,
    bus: Bus,
    runtime: CancellationToken,
}

impl Host {
    pub(crate) fn new(cfg: &Config, bus: Bus, runtime: CancellationToken) -> Self {
        Self {
            spawn_timeout: cfg.spawn_timeout,
            bus,
            runtime,
        }
    }

    /// Spawns a worker with default options.
    pub async fn spawn<W: Worker>(&self, args: W::Args) -> Result<WorkerHandle, SpawnError> {
        self.spawn_with::<W>(args, SpawnOptions::default()).await
    }

    /// Spawns a worker, blocking on the init handshake.
    pub async fn spawn_with<W: Worker>(
        &self,
        args: W::Args,
        opts: SpawnOptions,
    ) -> Result<WorkerHandle, SpawnError> {
        let timeout = opts.timeout.unwrap_or(self.spawn_timeout);
        let start_args = format!("{args:?}");
        let shared = Arc::new(WorkerShared::new(
            W::MODULE,
            start_args,
            self.runtime.child_token(),
        ));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, rx) = mpsc::unbounded_channel();

        let join = tokio::spawn(worker_loop::<W>(
            args,
            ready_tx,
            rx,
            Arc::clone(&shared),
            opts.link,
        ));

        match time::timeout(timeout, ready_rx).await {
            Err(_elapsed) => {
                join.abort();
                shared.hub.down(ExitReason::InitTimeout);
                Err(SpawnError::Timeout { timeout })
            }
            Ok(Err(_recv)) => {
                // The loop ended without acknowledging; its recorded fate
                // carries the reason.
                let reason = shared
                    .hub
                    .fate()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "init aborted".to_string());
                Err(SpawnError::InitFailed { reason })
            }
            Ok(Ok(Err(reason))) => Err(SpawnError::InitFailed { reason }),
            Ok(Ok(Ok(()))) => Ok(WorkerHandle::new(shared, tx, self.bus.clone())),
        }
    }
}

/// Renders a panic payload for reasons and diagnostics.
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Resolves when the optional linked token fires; pends forever otherwise.
async fn linked(link: &Option<CancellationToken>) {
    match link {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// The per-worker task: init handshake, then sequential message dispatch.
async fn worker_loop<W: Worker>(
    args: W::Args,
    ready: oneshot::Sender<Result<(), String>>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    shared: Arc<WorkerShared>,
    link: Option<CancellationToken>,
) {
    let init = AssertUnwindSafe(W::init(args)).catch_unwind().await;
    let (mut state, mut data) = match init {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            let reason = e.to_string();
            let _ = ready.send(Err(reason.clone()));
            shared.hub.down(ExitReason::InitFailed { reason });
            return;
        }
        Err(panic) => {
            let reason = panic_message(panic);
            let _ = ready.send(Err(reason.clone()));
            shared.hub.down(ExitReason::InitFailed { reason });
            return;
        }
    };

    shared.set_current_fn(state.name());
    if ready.send(Ok(())).is_err() {
        // The spawner gave up between init completion and the ack.
        shared.hub.down(ExitReason::InitTimeout);
        return;
    }

    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| data.started())) {
        let reason = ExitReason::Panic {
            details: panic_message(panic),
        };
        let _ = catch_unwind(AssertUnwindSafe(|| data.stopped(&reason)));
        shared.hub.down(reason);
        return;
    }

    let mut trace = false;
    let reason = loop {
        tokio::select! {
            _ = shared.stop.cancelled() => {
                break shared.take_stop_reason().unwrap_or(ExitReason::Canceled);
            }
            _ = linked(&link) => {
                break ExitReason::Canceled;
            }
            env = rx.recv() => match env {
                None => break ExitReason::Normal,
                Some(Envelope::Sys(sys)) => match sys {
                    SysMsg::Info(tx) => {
                        let _ = tx.send(shared.info());
                    }
                    SysMsg::Trace(on) => trace = on,
                },
                Some(Envelope::Request { msg, mut reply }) => {
                    if trace {
                        eprintln!(
                            "[depvisor] worker '{}' fn '{}' handling message",
                            W::MODULE,
                            state.name()
                        );
                    }
                    reply.arm_cast_trace(trace, W::MODULE);
                    match catch_unwind(AssertUnwindSafe(|| state.invoke(reply, msg, &mut data))) {
                        Err(panic) => {
                            break ExitReason::Panic {
                                details: panic_message(panic),
                            };
                        }
                        Ok(Step::Next(next)) => {
                            state = next;
                            shared.set_current_fn(state.name());
                        }
                        Ok(Step::NoChange) => {}
                        Ok(Step::Exit(reason)) => break reason,
                    }
                }
            }
        }
    };

    let _ = catch_unwind(AssertUnwindSafe(|| data.stopped(&reason)));
    shared.hub.down(reason);
}
