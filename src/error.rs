//! # Error types used by the depvisor engine and workers.
//!
//! This module defines the error enums of the public surface:
//!
//! - [`EngineError`] errors raised by the injector and the engine runtime.
//! - [`SpawnError`] failures of the worker init handshake.
//! - [`RpcError`] failures of request/response messaging.
//!
//! It also defines [`ExitReason`] — the typed termination reason that flows
//! through monitors and cascading teardown. An `ExitReason` is not an error:
//! it is the payload a death notification carries.
//!
//! All error types provide `as_label()` returning a short stable snake_case
//! label for logs and metrics.

use std::time::Duration;

use thiserror::Error;

use crate::factories::FactoryId;
use crate::host::WorkerId;
use crate::items::Key;

/// # Errors produced by the injector and the engine runtime.
///
/// Registration errors are returned to the caller with no state mutation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EngineError {
    /// Attempted to add a factory with an id that is already registered.
    #[error("factory '{id}' already added")]
    AlreadyAdded {
        /// The duplicate factory id.
        id: FactoryId,
    },

    /// Attempted to remove a factory that is not registered.
    #[error("factory '{id}' not found")]
    NotFound {
        /// The missing factory id.
        id: FactoryId,
    },

    /// The factory failed registration-time validation.
    #[error("invalid factory '{id}': {reason}")]
    InvalidFactory {
        /// The offending factory id.
        id: FactoryId,
        /// What the validation rejected.
        reason: String,
    },

    /// A worker pushed an item whose key is among its own factory's
    /// required keys. Accepting it would let the worker feed its own
    /// matching and spawn without bound.
    #[error("worker {worker:?} may not push item key '{key}' it depends on")]
    SelfInjection {
        /// The rejected item key.
        key: Key,
        /// The pushing worker.
        worker: WorkerId,
    },

    /// The injector event loop is not running (not started, or shut down).
    #[error("injector is not running")]
    NotRunning,

    /// Shutdown grace period was exceeded; some workers remained stuck.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Module names of workers that did not stop in time.
        stuck: Vec<String>,
    },
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::AlreadyAdded { .. } => "already_added",
            EngineError::NotFound { .. } => "not_found",
            EngineError::InvalidFactory { .. } => "invalid_factory",
            EngineError::SelfInjection { .. } => "self_injection",
            EngineError::NotRunning => "not_running",
            EngineError::GraceExceeded { .. } => "grace_exceeded",
        }
    }
}

/// # Failures of the worker init handshake.
///
/// Returned by [`Host::spawn`](crate::host::Host::spawn) and by factory
/// start recipes. A tuple whose spawn failed is never entered into the
/// active set and is not retried.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The worker did not complete `init` within the handshake timeout.
    /// The nascent worker task has been terminated.
    #[error("spawn_timeout: init did not complete within {timeout:?}")]
    Timeout { timeout: Duration },

    /// The worker's `init` returned an error or panicked.
    #[error("spawn_init_failed: {reason}")]
    InitFailed { reason: String },
}

impl SpawnError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::Timeout { .. } => "spawn_timeout",
            SpawnError::InitFailed { .. } => "spawn_init_failed",
        }
    }
}

/// # Failures of request/response messaging.
///
/// All failure modes share the error kind; the variant distinguishes the
/// reason payload.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RpcError {
    /// No reply arrived within the caller-specified timeout.
    /// The pending reply continuation is released.
    #[error("rpc_timeout: no reply within {timeout:?}")]
    Timeout { timeout: Duration },

    /// The worker exited before invoking its reply continuation.
    #[error("rpc_peer_down: {reason}")]
    PeerDown {
        /// The worker's exit reason.
        reason: ExitReason,
    },

    /// The handle does not refer to a live worker of this host and no exit
    /// reason was recorded for it. Should not happen for handles obtained
    /// from [`Host::spawn`](crate::host::Host::spawn).
    #[error("rpc_not_a_worker: handle does not refer to a live worker")]
    NotAWorker,
}

impl RpcError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            RpcError::Timeout { .. } => "rpc_timeout",
            RpcError::PeerDown { .. } => "rpc_peer_down",
            RpcError::NotAWorker => "rpc_not_a_worker",
        }
    }
}

/// # Why a monitored entity (worker or item) terminated.
///
/// This is **not an error** in the traditional sense: it is the reason
/// carried by death notifications and cascading terminations. An item
/// revocation reason travels unchanged into the `Revoked` terminations of
/// every dependent worker.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// Graceful completion (state function returned `Exit`, or the mailbox
    /// drained after all handles were dropped).
    Normal,
    /// Cooperative cancellation: engine shutdown or a linked token fired.
    Canceled,
    /// An input item was withdrawn; carries the withdrawal reason.
    Revoked { reason: String },
    /// Init did not complete within the handshake timeout.
    InitTimeout,
    /// Init returned an error or panicked before the handshake completed.
    InitFailed { reason: String },
    /// A state-function callback panicked.
    Panic { details: String },
}

impl ExitReason {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExitReason::Normal => "normal",
            ExitReason::Canceled => "canceled",
            ExitReason::Revoked { .. } => "revoked",
            ExitReason::InitTimeout => "init_timeout",
            ExitReason::InitFailed { .. } => "init_failed",
            ExitReason::Panic { .. } => "panic",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Normal => f.write_str("normal"),
            ExitReason::Canceled => f.write_str("canceled"),
            ExitReason::Revoked { reason } => write!(f, "revoked: {reason}"),
            ExitReason::InitTimeout => f.write_str("init_timeout"),
            ExitReason::InitFailed { reason } => write!(f, "init_failed: {reason}"),
            ExitReason::Panic { details } => write!(f, "panic: {details}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            SpawnError::Timeout {
                timeout: Duration::from_millis(500)
            }
            .as_label(),
            "spawn_timeout"
        );
        assert_eq!(RpcError::NotAWorker.as_label(), "rpc_not_a_worker");
        assert_eq!(ExitReason::Normal.as_label(), "normal");
        assert_eq!(
            ExitReason::Revoked {
                reason: "unplugged".into()
            }
            .as_label(),
            "revoked"
        );
    }

    #[test]
    fn revoked_reason_flows_through_display() {
        let r = ExitReason::Revoked {
            reason: "usb unplugged".into(),
        };
        assert_eq!(r.to_string(), "revoked: usb unplugged");
    }
}
