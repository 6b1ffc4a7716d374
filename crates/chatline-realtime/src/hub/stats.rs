//! Hub diagnostics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::MetricsSnapshot;

/// Point-in-time view of the hub.
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    /// Live connections.
    pub total_connections: usize,
    /// Distinct users with at least one live connection.
    pub online_users: usize,
    /// Conversations with at least one subscriber.
    pub subscribed_conversations: usize,
    /// Users with at least one presence watcher.
    pub watched_users: usize,
    /// Chat messages accepted since start.
    pub messages_sent: u64,
    /// Users currently typing somewhere.
    pub active_typists: usize,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    /// Cumulative counters.
    pub metrics: MetricsSnapshot,
}

/// Outcome of fanning out one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Frames queued on connection send buffers.
    pub delivered: u64,
    /// Connections removed because their buffer was full or closed.
    pub evicted: u64,
}
