//! Broadcast fan-out.

use std::collections::HashSet;

use tracing::{debug, error, warn};

use chatline_core::types::id::ConnectionId;

use super::engine::Hub;
use super::envelope::{BroadcastMessage, BroadcastTarget};
use super::stats::DeliveryReport;
use crate::connection::SendOutcome;
use crate::message::OutboundFrame;
use crate::message::serializer::encode_frame;

impl Hub {
    /// Deliver one broadcast to its resolved connections.
    ///
    /// The frame is encoded once. A connection whose queue is full or
    /// closed is evicted on the spot; the others still receive the frame.
    pub(crate) fn fan_out(&self, message: BroadcastMessage) -> DeliveryReport {
        let targets = self.resolve_targets(&message.target, message.exclude);
        let mut report = DeliveryReport::default();
        if targets.is_empty() {
            return report;
        }

        let frame = OutboundFrame::event(&message.event_type, message.payload);
        let bytes = match encode_frame(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(event_type = %message.event_type, error = %e, "Failed to encode broadcast");
                return report;
            }
        };

        for conn_id in targets {
            let Some(handle) = self.pool.get(&conn_id) else {
                continue;
            };
            match handle.try_send(bytes.clone()) {
                SendOutcome::Sent => report.delivered += 1,
                SendOutcome::Full => {
                    warn!(
                        conn_id = %conn_id,
                        user_id = %handle.user_id,
                        event_type = %message.event_type,
                        "Send buffer full, evicting connection"
                    );
                    self.metrics.frame_dropped();
                    self.evict(conn_id);
                    report.evicted += 1;
                }
                SendOutcome::Closed => {
                    debug!(conn_id = %conn_id, "Send buffer closed, evicting connection");
                    self.evict(conn_id);
                    report.evicted += 1;
                }
            }
        }

        self.metrics.frames_delivered(report.delivered);
        report
    }

    fn resolve_targets(
        &self,
        target: &BroadcastTarget,
        exclude: Option<ConnectionId>,
    ) -> HashSet<ConnectionId> {
        let mut targets: HashSet<ConnectionId> = match target {
            BroadcastTarget::Conversation(conversation_id) => {
                self.conversations.subscribers(conversation_id).into_iter().collect()
            }
            BroadcastTarget::Users(user_ids)
            | BroadcastTarget::Business { user_ids, .. } => user_ids
                .iter()
                .flat_map(|user_id| self.pool.user_connection_ids(user_id))
                .collect(),
        };

        if let Some(excluded) = exclude {
            targets.remove(&excluded);
        }
        targets
    }
}
