//! # Liveness monitoring primitive.
//!
//! A [`MonitorHub`] is embedded in every monitorable entity (workers and
//! items). Installing a monitor yields a [`MonitorToken`]; when the entity
//! dies, each registered watcher receives exactly one [`Down`] carrying
//! that token and the [`ExitReason`].
//!
//! ## Rules
//! - Death is recorded **once**; later `down` calls are no-ops.
//! - Monitoring an already-dead entity fires immediately (at-least-once).
//! - `demonitor` releases a watch; a released token never fires.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::{mpsc, watch};

use crate::error::ExitReason;

/// Global counter for monitor tokens.
static TOKEN_SEQ: AtomicU64 = AtomicU64::new(1);

/// Stable correlation token returned by `monitor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorToken(u64);

/// Death notification delivered to a watcher.
#[derive(Debug, Clone)]
pub struct Down {
    /// The token returned when the watch was installed.
    pub token: MonitorToken,
    /// Why the watched entity terminated.
    pub reason: ExitReason,
}

/// Channel end a watcher registers for `Down` delivery.
pub type DownSender = mpsc::UnboundedSender<Down>;

struct HubState {
    fate: Option<ExitReason>,
    watchers: Vec<(MonitorToken, DownSender)>,
}

/// Shared death-notification core for one entity.
pub(crate) struct MonitorHub {
    state: Mutex<HubState>,
    done: watch::Sender<Option<ExitReason>>,
}

impl MonitorHub {
    pub(crate) fn new() -> Self {
        let (done, _) = watch::channel(None);
        Self {
            state: Mutex::new(HubState {
                fate: None,
                watchers: Vec::new(),
            }),
            done,
        }
    }

    /// Installs a one-shot watch. Fires immediately if the entity is
    /// already dead.
    pub(crate) fn monitor(&self, tx: DownSender) -> MonitorToken {
        let token = MonitorToken(TOKEN_SEQ.fetch_add(1, AtomicOrdering::Relaxed));
        let mut st = self.lock();
        match &st.fate {
            Some(reason) => {
                let _ = tx.send(Down {
                    token,
                    reason: reason.clone(),
                });
            }
            None => st.watchers.push((token, tx)),
        }
        token
    }

    /// Releases a watch. A released token never fires.
    pub(crate) fn demonitor(&self, token: MonitorToken) {
        self.lock().watchers.retain(|(t, _)| *t != token);
    }

    /// Records the death and fires all registered watchers.
    ///
    /// Returns `false` if the entity was already dead (first reason wins).
    pub(crate) fn down(&self, reason: ExitReason) -> bool {
        let watchers = {
            let mut st = self.lock();
            if st.fate.is_some() {
                return false;
            }
            st.fate = Some(reason.clone());
            std::mem::take(&mut st.watchers)
        };
        let _ = self.done.send(Some(reason.clone()));
        for (token, tx) in watchers {
            let _ = tx.send(Down {
                token,
                reason: reason.clone(),
            });
        }
        true
    }

    /// The recorded exit reason, if the entity died.
    pub(crate) fn fate(&self) -> Option<ExitReason> {
        self.lock().fate.clone()
    }

    /// True once the entity died.
    pub(crate) fn is_down(&self) -> bool {
        self.lock().fate.is_some()
    }

    /// Waits until the entity dies and returns the reason.
    /// Resolves immediately if it is already dead.
    pub(crate) async fn terminated(&self) -> ExitReason {
        let mut rx = self.done.subscribe();
        loop {
            {
                let current = rx.borrow();
                if let Some(reason) = current.as_ref() {
                    return reason.clone();
                }
            }
            if rx.changed().await.is_err() {
                // Hub dropped without a recorded fate.
                return ExitReason::Canceled;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_each_watcher_once() {
        let hub = MonitorHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = hub.monitor(tx);

        assert!(hub.down(ExitReason::Normal));
        assert!(!hub.down(ExitReason::Canceled), "second down is a no-op");

        let down = rx.recv().await.unwrap();
        assert_eq!(down.token, token);
        assert_eq!(down.reason, ExitReason::Normal);
        assert_eq!(hub.fate(), Some(ExitReason::Normal));
    }

    #[tokio::test]
    async fn monitor_after_death_fires_immediately() {
        let hub = MonitorHub::new();
        hub.down(ExitReason::Normal);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = hub.monitor(tx);
        let down = rx.recv().await.unwrap();
        assert_eq!(down.token, token);
    }

    #[tokio::test]
    async fn demonitored_token_never_fires() {
        let hub = MonitorHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = hub.monitor(tx);
        hub.demonitor(token);
        hub.down(ExitReason::Normal);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminated_resolves_on_down() {
        let hub = std::sync::Arc::new(MonitorHub::new());
        let waiter = {
            let hub = std::sync::Arc::clone(&hub);
            tokio::spawn(async move { hub.terminated().await })
        };
        hub.down(ExitReason::Normal);
        assert_eq!(waiter.await.unwrap(), ExitReason::Normal);
    }
}
