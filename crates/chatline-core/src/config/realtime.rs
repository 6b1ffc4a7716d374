//! Real-time hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Real-time hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each connection's outbound frame queue.
    #[serde(default = "default_send_buffer")]
    pub send_buffer_size: usize,
    /// Capacity of the hub's broadcast queue.
    #[serde(default = "default_broadcast_queue")]
    pub broadcast_queue_size: usize,
    /// Interval between liveness sweeps in seconds.
    #[serde(default = "default_heartbeat_check_interval")]
    pub heartbeat_check_interval_seconds: u64,
    /// A connection without a heartbeat for this long is unregistered.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_seconds: u64,
    /// Number of conversations subscribed eagerly when a connection registers.
    #[serde(default = "default_eager_subscribe_limit")]
    pub eager_subscribe_limit: usize,
    /// Delay before pushing watched users' statuses to a fresh connection.
    #[serde(default = "default_presence_settle_delay")]
    pub presence_settle_delay_ms: u64,
    /// How long an offline user's last-seen time is kept.
    #[serde(default = "default_last_seen_retention")]
    pub last_seen_retention_seconds: u64,
    /// Maximum accepted size of a raw inbound command in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Token bucket capacity for per-connection command admission.
    #[serde(default = "default_command_burst")]
    pub command_rate_limit_burst: u32,
    /// Interval after which the command bucket is fully refilled.
    #[serde(default = "default_command_interval")]
    pub command_rate_limit_interval_seconds: u64,
    /// Typing indicator settings.
    #[serde(default)]
    pub typing: TypingConfig,
}

/// Typing indicator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Minimum spacing between admitted typing starts for one user in one conversation.
    #[serde(default = "default_typing_rate_limit")]
    pub rate_limit_ms: u64,
    /// Inactivity after which typing is stopped by the server.
    #[serde(default = "default_typing_auto_stop")]
    pub auto_stop_seconds: u64,
    /// Interval of the stale-entry sweep.
    #[serde(default = "default_typing_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Age after which the sweep force-deletes an entry.
    #[serde(default = "default_typing_stale_after")]
    pub stale_after_seconds: u64,
}

impl RealtimeConfig {
    /// Liveness sweep interval.
    pub fn heartbeat_check_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_check_interval_seconds)
    }

    /// Liveness timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_seconds)
    }

    /// Presence settle delay.
    pub fn presence_settle_delay(&self) -> Duration {
        Duration::from_millis(self.presence_settle_delay_ms)
    }

    /// Last-seen retention.
    pub fn last_seen_retention(&self) -> Duration {
        Duration::from_secs(self.last_seen_retention_seconds)
    }

    /// Command bucket refill interval.
    pub fn command_rate_limit_interval(&self) -> Duration {
        Duration::from_secs(self.command_rate_limit_interval_seconds)
    }
}

impl TypingConfig {
    /// Minimum spacing between admitted starts.
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    /// Auto-stop delay.
    pub fn auto_stop(&self) -> Duration {
        Duration::from_secs(self.auto_stop_seconds)
    }

    /// Sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Stale threshold.
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_seconds)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: default_send_buffer(),
            broadcast_queue_size: default_broadcast_queue(),
            heartbeat_check_interval_seconds: default_heartbeat_check_interval(),
            heartbeat_timeout_seconds: default_heartbeat_timeout(),
            eager_subscribe_limit: default_eager_subscribe_limit(),
            presence_settle_delay_ms: default_presence_settle_delay(),
            last_seen_retention_seconds: default_last_seen_retention(),
            max_message_size: default_max_message_size(),
            command_rate_limit_burst: default_command_burst(),
            command_rate_limit_interval_seconds: default_command_interval(),
            typing: TypingConfig::default(),
        }
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: default_typing_rate_limit(),
            auto_stop_seconds: default_typing_auto_stop(),
            sweep_interval_seconds: default_typing_sweep_interval(),
            stale_after_seconds: default_typing_stale_after(),
        }
    }
}

fn default_send_buffer() -> usize {
    256
}

fn default_broadcast_queue() -> usize {
    1024
}

fn default_heartbeat_check_interval() -> u64 {
    30
}

fn default_heartbeat_timeout() -> u64 {
    90
}

fn default_eager_subscribe_limit() -> usize {
    5
}

fn default_presence_settle_delay() -> u64 {
    500
}

fn default_last_seen_retention() -> u64 {
    86_400
}

fn default_max_message_size() -> usize {
    65_536
}

fn default_command_burst() -> u32 {
    30
}

fn default_command_interval() -> u64 {
    1
}

fn default_typing_rate_limit() -> u64 {
    1000
}

fn default_typing_auto_stop() -> u64 {
    5
}

fn default_typing_sweep_interval() -> u64 {
    60
}

fn default_typing_stale_after() -> u64 {
    10
}
