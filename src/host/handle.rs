//! # Worker handle: mailbox, identity, stop token, RPC.
//!
//! [`WorkerHandle`] is the cheap-clone reference callers hold to a spawned
//! worker. Possessing a handle does not imply permission to mutate the
//! worker's state; all interaction goes through its mailbox.
//!
//! ## Rules
//! - `rpc` blocks until the worker replies, dies, or the timeout fires;
//!   all failures share [`RpcError`] with distinguishable payloads.
//! - `cast` is fire-and-forget; delivery to a dead worker is silently
//!   dropped.
//! - `stop(reason)` requests termination through the worker's stop token;
//!   the first recorded reason wins.
//! - System messages (`sys_info`, `set_trace`) bypass user callbacks.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::{ExitReason, RpcError};
use crate::events::{Bus, Event, EventKind};

use super::monitor::{DownSender, MonitorHub, MonitorToken};
use super::worker::{Msg, Reply};

/// Global counter for worker ids.
static WORKER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique worker identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn next() -> Self {
        Self(WORKER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Inspectable worker identity metadata.
///
/// Used for logging and RPC error enrichment.
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    /// Stable module name (`Worker::MODULE`).
    pub module: &'static str,
    /// Name of the current state function.
    pub current_fn: &'static str,
    /// Debug rendering of the spawn arguments.
    pub start_args: String,
}

/// Message envelope routed through a worker mailbox.
pub(crate) enum Envelope {
    /// User message with its reply continuation.
    Request { msg: Msg, reply: Reply },
    /// System message, handled without touching user callbacks.
    Sys(SysMsg),
}

/// System messages: identity query and trace toggle.
pub(crate) enum SysMsg {
    Info(oneshot::Sender<WorkerInfo>),
    Trace(bool),
}

/// State shared between a worker task and its handles.
pub(crate) struct WorkerShared {
    pub(crate) id: WorkerId,
    pub(crate) hub: MonitorHub,
    pub(crate) stop: CancellationToken,
    info: Mutex<WorkerInfo>,
    stop_reason: Mutex<Option<ExitReason>>,
}

impl WorkerShared {
    pub(crate) fn new(module: &'static str, start_args: String, stop: CancellationToken) -> Self {
        Self {
            id: WorkerId::next(),
            hub: MonitorHub::new(),
            stop,
            info: Mutex::new(WorkerInfo {
                module,
                current_fn: "init",
                start_args,
            }),
            stop_reason: Mutex::new(None),
        }
    }

    pub(crate) fn info(&self) -> WorkerInfo {
        self.info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_current_fn(&self, name: &'static str) {
        self.info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_fn = name;
    }

    pub(crate) fn record_stop_reason(&self, reason: ExitReason) {
        let mut slot = self
            .stop_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(reason);
        }
    }

    pub(crate) fn take_stop_reason(&self) -> Option<ExitReason> {
        self.stop_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Cheap-clone handle to a spawned worker.
#[derive(Clone)]
pub struct WorkerHandle {
    shared: Arc<WorkerShared>,
    tx: mpsc::UnboundedSender<Envelope>,
    bus: Bus,
}

impl WorkerHandle {
    pub(crate) fn new(
        shared: Arc<WorkerShared>,
        tx: mpsc::UnboundedSender<Envelope>,
        bus: Bus,
    ) -> Self {
        Self { shared, tx, bus }
    }

    /// The worker's process-unique id.
    pub fn id(&self) -> WorkerId {
        self.shared.id
    }

    /// Snapshot of the worker's identity metadata.
    pub fn info(&self) -> WorkerInfo {
        self.shared.info()
    }

    /// Sends a request and blocks until the worker invokes its reply
    /// continuation, dies, or the timeout fires.
    ///
    /// `timeout = None` waits indefinitely (until reply or death). On
    /// expiry the pending reply continuation is released and any late
    /// reply is dropped.
    pub async fn rpc(
        &self,
        msg: impl Any + Send,
        timeout: Option<Duration>,
    ) -> Result<Msg, RpcError> {
        let (tx, rx) = oneshot::channel();
        let env = Envelope::Request {
            msg: Box::new(msg),
            reply: Reply::rpc(tx),
        };
        if self.tx.send(env).is_err() {
            let err = match self.shared.hub.fate() {
                Some(reason) => RpcError::PeerDown { reason },
                None => RpcError::NotAWorker,
            };
            self.report_rpc_failure(&err);
            return Err(err);
        }

        // A dropped continuation does not fail the call by itself: the
        // caller stays blocked until the worker actually dies (or the
        // timeout fires), mirroring the call semantics of the reply
        // contract.
        let wait = async {
            match rx.await {
                Ok(reply) => Ok(reply),
                Err(_) => Err(RpcError::PeerDown {
                    reason: self.shared.hub.terminated().await,
                }),
            }
        };

        let res = match timeout {
            Some(d) => match time::timeout(d, wait).await {
                Ok(r) => r,
                Err(_elapsed) => Err(RpcError::Timeout { timeout: d }),
            },
            None => wait.await,
        };

        if let Err(e) = &res {
            self.report_rpc_failure(e);
        }
        res
    }

    /// Fire-and-forget message. The callback still receives a reply
    /// continuation; invoking it discards the value.
    pub fn cast(&self, msg: impl Any + Send) {
        let _ = self.tx.send(Envelope::Request {
            msg: Box::new(msg),
            reply: Reply::cast(),
        });
    }

    /// Queries the worker's identity over the system-message path.
    pub async fn sys_info(&self) -> Result<WorkerInfo, RpcError> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Envelope::Sys(SysMsg::Info(tx))).is_err() {
            return Err(self.down_error());
        }
        match rx.await {
            Ok(info) => Ok(info),
            Err(_) => Err(self.down_error()),
        }
    }

    /// Toggles per-worker message tracing.
    pub fn set_trace(&self, on: bool) {
        let _ = self.tx.send(Envelope::Sys(SysMsg::Trace(on)));
    }

    /// Requests termination with the given reason. The first recorded
    /// reason wins; termination itself is asynchronous.
    pub fn stop(&self, reason: ExitReason) {
        self.shared.record_stop_reason(reason);
        self.shared.stop.cancel();
    }

    /// Installs a one-shot liveness watch. Fires immediately if the worker
    /// is already dead.
    pub fn monitor(&self, tx: DownSender) -> MonitorToken {
        self.shared.hub.monitor(tx)
    }

    /// Releases a liveness watch.
    pub fn demonitor(&self, token: MonitorToken) {
        self.shared.hub.demonitor(token)
    }

    /// True once the worker terminated.
    pub fn is_terminated(&self) -> bool {
        self.shared.hub.is_down()
    }

    /// Waits for termination and returns the exit reason.
    pub async fn terminated(&self) -> ExitReason {
        self.shared.hub.terminated().await
    }

    fn down_error(&self) -> RpcError {
        match self.shared.hub.fate() {
            Some(reason) => RpcError::PeerDown { reason },
            None => RpcError::NotAWorker,
        }
    }

    fn report_rpc_failure(&self, err: &RpcError) {
        let info = self.info();
        self.bus.publish(
            Event::now(EventKind::RpcFailed)
                .with_worker(self.id())
                .with_error(format!(
                    "module={} fn={}: {err}",
                    info.module, info.current_fn
                )),
        );
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let info = self.info();
        f.debug_struct("WorkerHandle")
            .field("id", &self.shared.id)
            .field("module", &info.module)
            .field("current_fn", &info.current_fn)
            .finish()
    }
}
