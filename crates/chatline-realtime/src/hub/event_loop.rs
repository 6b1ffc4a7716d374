//! The hub control loop.
//!
//! One task owns every registry mutation: registration, unregistration,
//! broadcast fan-out and the liveness sweep are applied in the order the
//! loop observes them.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatline_core::types::id::ConnectionId;

use super::engine::Hub;
use super::envelope::BroadcastMessage;
use crate::connection::ConnectionHandle;
use crate::presence::{PresenceTracker, PresenceTransition};

/// Registry change requested by a connection task.
#[derive(Debug)]
pub(crate) enum ControlRequest {
    Register {
        handle: Arc<ConnectionHandle>,
        done: oneshot::Sender<()>,
    },
    Unregister {
        conn_id: ConnectionId,
        done: oneshot::Sender<bool>,
    },
}

/// Receiving side of the hub's queues. Consumed by [`HubLoop::run`].
#[derive(Debug)]
pub struct HubLoop {
    hub: Arc<Hub>,
    control_rx: mpsc::Receiver<ControlRequest>,
    broadcast_rx: mpsc::Receiver<BroadcastMessage>,
    presence_rx: mpsc::UnboundedReceiver<PresenceTransition>,
}

impl HubLoop {
    /// Create the loop over its receiving ends.
    pub(crate) fn new(
        hub: Arc<Hub>,
        control_rx: mpsc::Receiver<ControlRequest>,
        broadcast_rx: mpsc::Receiver<BroadcastMessage>,
        presence_rx: mpsc::UnboundedReceiver<PresenceTransition>,
    ) -> Self {
        Self {
            hub,
            control_rx,
            broadcast_rx,
            presence_rx,
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Also drives the presence worker, which applies online/offline
    /// transitions in the order this loop produced them.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            hub,
            mut control_rx,
            mut broadcast_rx,
            presence_rx,
        } = self;

        let presence_worker = tokio::spawn(PresenceTracker::run(
            hub.clone(),
            presence_rx,
            cancel.clone(),
        ));

        let period = hub.config().heartbeat_check_interval();
        let timeout = hub.config().heartbeat_timeout();
        let retention = hub.config().last_seen_retention();
        let mut liveness = tokio::time::interval_at(Instant::now() + period, period);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            check_interval_secs = period.as_secs(),
            timeout_secs = timeout.as_secs(),
            "Hub loop started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Hub loop received shutdown signal");
                    break;
                }

                Some(request) = control_rx.recv() => {
                    match request {
                        ControlRequest::Register { handle, done } => {
                            hub.add_connection(handle);
                            let _ = done.send(());
                        }
                        ControlRequest::Unregister { conn_id, done } => {
                            let removed = hub.remove_connection(conn_id);
                            let _ = done.send(removed);
                        }
                    }
                }

                Some(message) = broadcast_rx.recv() => {
                    let report = hub.fan_out(message);
                    if report.evicted > 0 {
                        debug!(
                            delivered = report.delivered,
                            evicted = report.evicted,
                            "Broadcast evicted slow connections"
                        );
                    }
                }

                _ = liveness.tick() => {
                    let stale = hub.pool.stale_connections(timeout);
                    for conn_id in stale {
                        warn!(conn_id = %conn_id, "Connection missed heartbeat deadline");
                        hub.remove_connection(conn_id);
                    }
                    let pruned = hub.presence().prune_last_seen(retention);
                    if pruned > 0 {
                        debug!(pruned, "Expired last-seen entries");
                    }
                }
            }
        }

        let remaining: Vec<ConnectionId> = hub
            .pool
            .all_connections()
            .iter()
            .map(|handle| handle.id)
            .collect();
        for conn_id in &remaining {
            hub.remove_connection(*conn_id);
        }

        if let Err(e) = presence_worker.await {
            warn!(error = %e, "Presence worker terminated abnormally");
        }

        info!(closed = remaining.len(), "Hub loop stopped");
    }
}
