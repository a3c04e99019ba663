//! Leader-only heartbeat emitter.

use crate::server::DiscoverySender;
use crate::wire::{Datagram, NodeId};
use crate::{pf_debug, pf_trace, pf_warn};

use tokio::sync::watch;
use tokio::time::{self, Duration};

/// Controls the leader heartbeat beacon. A fresh emitter task is spawned on
/// every election win; the task exits as soon as the leader role is lost,
/// signaled through a watch channel rather than a polled flag.
pub struct Heartbeater {
    sending_tx: watch::Sender<bool>,
    interval: Duration,
}

impl Heartbeater {
    /// Creates an inactive heartbeater with the given beacon interval.
    pub fn new(interval: Duration) -> Self {
        let (sending_tx, _) = watch::channel(false);
        Heartbeater {
            sending_tx,
            interval,
        }
    }

    /// True while an emitter task is active.
    pub fn is_sending(&self) -> bool {
        *self.sending_tx.borrow()
    }

    /// Spawns a fresh emitter task that broadcasts `heartbeat { id, port }`
    /// every interval (first beat immediately) until signaled to stop.
    pub fn start(&self, sender: DiscoverySender, id: NodeId, service_port: u16) {
        if self.is_sending() {
            return; // an emitter task is already beating
        }
        self.sending_tx.send_replace(true);

        let mut sending_rx = self.sending_tx.subscribe();
        let interval = self.interval;
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let beat = Datagram::Heartbeat {
                            id: id.clone(),
                            port: service_port,
                        };
                        match sender.bcast(&beat).await {
                            Ok(()) => pf_trace!("heartbeat sent"),
                            Err(e) => pf_warn!("heartbeat send failed: {}", e),
                        }
                    }
                    result = sending_rx.changed() => {
                        if result.is_err() || !*sending_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            pf_debug!("heartbeat emitter exited");
        });
    }

    /// Signals the emitter task to exit. Idempotent; a no-op when nothing
    /// is beating.
    pub fn stop(&self) {
        self.sending_tx.send_replace(false);
    }
}
