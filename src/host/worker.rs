//! # Worker module contract and state-function dispatch.
//!
//! A worker module is a type implementing [`Worker`]: an async `init` that
//! builds the initial state and names the first state function, plus
//! optional `started`/`stopped` hooks. Every inbound message invokes the
//! current [`StateFn`] with a [`Reply`] continuation, the message, and
//! mutable access to the state; the returned [`Step`] either transitions
//! to another state function, keeps the current one, or exits.
//!
//! ## Rules
//! - State functions are plain `fn` pointers carrying a `&'static str`
//!   name, so worker identity metadata stays inspectable without
//!   reflection.
//! - The reply continuation may be invoked inside the callback or stored
//!   in the state and invoked later; it is consumed by `send`.
//! - A reply sent to a `cast` message is discarded (traced when
//!   sys-tracing is enabled for the worker).
//!
//! ## Example
//! ```
//! use depvisor::{BoxError, Msg, Reply, StateFn, Step, Worker};
//! use async_trait::async_trait;
//!
//! struct Counter {
//!     count: u64,
//! }
//!
//! fn counting(reply: Reply, _msg: Msg, state: &mut Counter) -> Step<Counter> {
//!     state.count += 1;
//!     reply.send(state.count);
//!     Step::NoChange
//! }
//!
//! #[async_trait]
//! impl Worker for Counter {
//!     const MODULE: &'static str = "counter";
//!     type Args = u64;
//!
//!     async fn init(start: u64) -> Result<(StateFn<Self>, Self), BoxError> {
//!         Ok((StateFn::new("counting", counting), Counter { count: start }))
//!     }
//! }
//! ```

use std::any::Any;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::ExitReason;

/// Opaque message payload exchanged with workers.
pub type Msg = Box<dyn Any + Send>;

/// Boxed error returned by `Worker::init`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// # Asynchronous, supervisable unit of work.
///
/// Implementations define how the worker is initialized and how its state
/// machine reacts to messages.
///
/// ## Rules
/// - `init` runs **inside** the worker task; the spawner blocks on the
///   handshake until it completes or the handshake timeout fires.
/// - `started` runs after a successful handshake, before the first message.
/// - `stopped` is invoked best-effort with the exit reason; a panic inside
///   it is swallowed.
#[async_trait]
pub trait Worker: Sized + Send + 'static {
    /// Stable module name, part of the worker's identity metadata.
    const MODULE: &'static str;

    /// Arguments passed to `init`. The `Debug` rendering is recorded as
    /// the worker's `start_args` identity metadata.
    type Args: std::fmt::Debug + Send + 'static;

    /// Builds the initial state and selects the first state function.
    async fn init(args: Self::Args) -> Result<(StateFn<Self>, Self), BoxError>;

    /// Hook invoked once after a successful init handshake.
    fn started(&mut self) {}

    /// Hook invoked best-effort before teardown.
    fn stopped(&mut self, _reason: &ExitReason) {}
}

/// A named state function: the worker's current message handler.
pub struct StateFn<W> {
    name: &'static str,
    f: fn(Reply, Msg, &mut W) -> Step<W>,
}

impl<W> StateFn<W> {
    /// Wraps a handler function under a stable name.
    ///
    /// The name shows up in identity metadata (`current_fn`) and trace
    /// output; conventionally it matches the function's own name.
    pub const fn new(name: &'static str, f: fn(Reply, Msg, &mut W) -> Step<W>) -> Self {
        Self { name, f }
    }

    /// The handler's stable name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn invoke(&self, reply: Reply, msg: Msg, state: &mut W) -> Step<W> {
        (self.f)(reply, msg, state)
    }
}

impl<W> Clone for StateFn<W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W> Copy for StateFn<W> {}

/// Outcome of a state-function callback.
pub enum Step<W> {
    /// Transition to another state function.
    Next(StateFn<W>),
    /// Keep the current state function.
    NoChange,
    /// Terminate the worker with the given reason.
    Exit(ExitReason),
}

/// One-shot reply continuation handed to every state-function invocation.
///
/// For `rpc` messages, `send` delivers the value to the blocked caller.
/// For `cast` messages, `send` discards the value.
pub struct Reply {
    to: ReplyTo,
}

enum ReplyTo {
    Rpc(oneshot::Sender<Msg>),
    Cast { trace: bool, module: &'static str },
}

impl Reply {
    pub(crate) fn rpc(tx: oneshot::Sender<Msg>) -> Self {
        Self {
            to: ReplyTo::Rpc(tx),
        }
    }

    pub(crate) fn cast() -> Self {
        Self {
            to: ReplyTo::Cast {
                trace: false,
                module: "",
            },
        }
    }

    /// Tags a cast reply with the worker's trace flag so a discarded reply
    /// can be reported.
    pub(crate) fn arm_cast_trace(&mut self, trace: bool, module: &'static str) {
        if let ReplyTo::Cast { trace: t, module: m } = &mut self.to {
            *t = trace;
            *m = module;
        }
    }

    /// Invokes the continuation, consuming it.
    ///
    /// If the caller went away (RPC timeout released the receiver) or the
    /// message was a cast, the value is dropped.
    pub fn send(self, value: impl Any + Send) {
        match self.to {
            ReplyTo::Rpc(tx) => {
                let _ = tx.send(Box::new(value));
            }
            ReplyTo::Cast { trace, module } => {
                if trace {
                    eprintln!("[depvisor] worker '{module}' discarded reply to cast");
                }
            }
        }
    }

    /// True if a caller is blocked on this reply.
    pub fn expects_reply(&self) -> bool {
        matches!(self.to, ReplyTo::Rpc(_))
    }
}
