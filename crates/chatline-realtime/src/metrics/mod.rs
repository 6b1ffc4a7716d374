//! Hub metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Cumulative hub counters.
#[derive(Debug, Default)]
pub struct RealtimeMetrics {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    evictions: AtomicU64,
    broadcasts_queued: AtomicU64,
    broadcasts_dropped: AtomicU64,
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
    commands_received: AtomicU64,
    commands_failed: AtomicU64,
    messages_sent: AtomicU64,
}

impl RealtimeMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a registered connection.
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an unregistered connection.
    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// A connection was unregistered because its queue was full or closed.
    pub fn connection_evicted(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a broadcast accepted by the queue.
    pub fn broadcast_queued(&self) {
        self.broadcasts_queued.fetch_add(1, Ordering::Relaxed);
    }

    /// The broadcast queue was full and an envelope was discarded.
    pub fn broadcast_dropped(&self) {
        self.broadcasts_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record frames handed to connection queues.
    pub fn frames_delivered(&self, count: u64) {
        self.frames_delivered.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a unicast frame dropped on a full queue.
    pub fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an inbound command.
    pub fn command_received(&self) {
        self.commands_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed command.
    pub fn command_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted chat message.
    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Chat messages accepted so far.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            broadcasts_queued: self.broadcasts_queued.load(Ordering::Relaxed),
            broadcasts_dropped: self.broadcasts_dropped.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            commands_received: self.commands_received.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub evictions: u64,
    pub broadcasts_queued: u64,
    pub broadcasts_dropped: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub commands_received: u64,
    pub commands_failed: u64,
    pub messages_sent: u64,
}
