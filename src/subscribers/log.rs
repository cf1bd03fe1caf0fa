//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [factory-added] id=probe
//! [item-pushed] key=port value=7 ref=#3
//! [child-starting] factory=probe tuple=[{port, 7}]
//! [child-started] factory=probe worker=w1
//! [item-revoked] key=port ref=#3 reason="revoked: unplugged"
//! [child-stopped] factory=probe reason="revoked: unplugged"
//! [rpc-failed] worker=w1 err="rpc_peer_down: revoked: unplugged"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Not intended for production use —
/// implement a custom [`Subscribe`] for structured sinks.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::FactoryAdded => {
                println!("[factory-added] id={:?}", e.factory);
            }
            EventKind::FactoryRemoved => {
                println!("[factory-removed] id={:?}", e.factory);
            }
            EventKind::ItemPushed => {
                println!(
                    "[item-pushed] key={:?} value={:?} ref={:?}",
                    e.key, e.value, e.item
                );
            }
            EventKind::ItemRevoked => {
                println!(
                    "[item-revoked] key={:?} ref={:?} reason={:?}",
                    e.key, e.item, e.error
                );
            }
            EventKind::ChildStarting => {
                println!("[child-starting] factory={:?} tuple={:?}", e.factory, e.value);
            }
            EventKind::ChildStarted => {
                println!("[child-started] factory={:?} worker={:?}", e.factory, e.worker);
            }
            EventKind::ChildStopping => {
                println!("[child-stopping] factory={:?} worker={:?}", e.factory, e.worker);
            }
            EventKind::ChildStopped => {
                println!(
                    "[child-stopped] factory={:?} reason={:?}",
                    e.factory, e.error
                );
            }
            EventKind::RpcFailed => {
                println!("[rpc-failed] worker={:?} err={:?}", e.worker, e.error);
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                println!("[subscriber-diag] {:?}", e.error);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
