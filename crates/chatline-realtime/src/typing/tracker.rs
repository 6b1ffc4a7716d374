//! Typing indicator state per (conversation, user).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use chatline_core::config::TypingConfig;
use chatline_core::traits::UserRepository;
use chatline_core::types::id::{ConnectionId, ConversationId, UserId};

use crate::hub::Notifier;
use crate::message::{builder, events};
use crate::ratelimit::IntervalLimiter;

/// Key of one typing indicator.
pub type TypingKey = (ConversationId, UserId);

/// A live indicator. Its presence in the map means "typing".
#[derive(Debug)]
struct TypingStatus {
    /// Last admitted start.
    started_at: Instant,
    /// Bumped on every admitted start; auto-stop only fires for its own generation.
    generation: u64,
    /// Connection that started typing, left out of the broadcasts.
    origin: Option<ConnectionId>,
    /// Pending auto-stop task.
    timer: AbortHandle,
}

/// Idle/typing state machine with rate-limited starts and auto-stop.
pub struct TypingTracker {
    entries: DashMap<TypingKey, TypingStatus>,
    limiter: IntervalLimiter<TypingKey>,
    generation: AtomicU64,
    notifier: Notifier,
    users: Option<Arc<dyn UserRepository>>,
    config: TypingConfig,
}

impl std::fmt::Debug for TypingTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingTracker")
            .field("active", &self.entries.len())
            .field("config", &self.config)
            .finish()
    }
}

impl TypingTracker {
    /// Create a new typing tracker.
    pub fn new(
        config: TypingConfig,
        notifier: Notifier,
        users: Option<Arc<dyn UserRepository>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            limiter: IntervalLimiter::new(config.rate_limit()),
            generation: AtomicU64::new(0),
            notifier,
            users,
            config,
        })
    }

    /// Handle a typing start. Returns `false` when rate limited.
    ///
    /// An admitted start replaces any pending auto-stop and broadcasts again.
    pub async fn start(
        self: &Arc<Self>,
        conversation_id: ConversationId,
        user_id: UserId,
        origin: Option<ConnectionId>,
    ) -> bool {
        let key = (conversation_id, user_id);
        if !self.limiter.try_acquire(&key) {
            trace!(conversation_id = %conversation_id, user_id = %user_id, "Typing start rate limited");
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let tracker = Arc::clone(self);
        let delay = self.config.auto_stop();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracker.expire(key, generation);
        })
        .abort_handle();

        let status = TypingStatus {
            started_at: Instant::now(),
            generation,
            origin,
            timer,
        };
        if let Some(previous) = self.entries.insert(key, status) {
            previous.timer.abort();
        }

        // A stop or newer start during the lookup owns the entry now.
        let display_name = self.display_name(user_id).await;
        if !self.is_current(&key, generation) {
            trace!(conversation_id = %conversation_id, user_id = %user_id, "Typing start superseded");
            return true;
        }

        self.notifier.notify_conversation(
            conversation_id,
            events::TYPING_STARTED,
            builder::typing_started(conversation_id, user_id, &display_name),
            origin,
        );
        self.notifier.notify_conversation(
            conversation_id,
            events::USER_TYPING,
            builder::user_typing(conversation_id, user_id, Some(&display_name), true),
            origin,
        );
        true
    }

    fn is_current(&self, key: &TypingKey, generation: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|status| status.generation == generation)
    }

    /// Handle a manual stop. Returns `false` if the user was not typing.
    pub fn stop(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        origin: Option<ConnectionId>,
    ) -> bool {
        let Some((key, status)) = self.entries.remove(&(conversation_id, user_id)) else {
            return false;
        };
        status.timer.abort();
        self.broadcast_stopped(key, origin.or(status.origin));
        true
    }

    /// Auto-stop for `generation`. A newer start leaves the entry in place.
    fn expire(&self, key: TypingKey, generation: u64) {
        let removed = self
            .entries
            .remove_if(&key, |_, status| status.generation == generation);
        if let Some((key, status)) = removed {
            debug!(conversation_id = %key.0, user_id = %key.1, "Typing auto-stopped");
            self.broadcast_stopped(key, status.origin);
        }
    }

    fn broadcast_stopped(&self, key: TypingKey, origin: Option<ConnectionId>) {
        let (conversation_id, user_id) = key;
        self.notifier.notify_conversation(
            conversation_id,
            events::TYPING_STOPPED,
            builder::typing_stopped(conversation_id, user_id),
            origin,
        );
        self.notifier.notify_conversation(
            conversation_id,
            events::USER_TYPING,
            builder::user_typing(conversation_id, user_id, None, false),
            origin,
        );
    }

    /// Drop entries older than the stale threshold without broadcasting.
    ///
    /// Returns how many entries were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let stale_after = self.config.stale_after();
        let is_stale = |status: &TypingStatus| now.duration_since(status.started_at) > stale_after;

        let stale: Vec<TypingKey> = self
            .entries
            .iter()
            .filter(|entry| is_stale(entry.value()))
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for key in stale {
            if let Some((_, status)) = self.entries.remove_if(&key, |_, status| is_stale(status)) {
                status.timer.abort();
                removed += 1;
            }
        }

        let pruned = self.limiter.prune(stale_after);
        if removed > 0 || pruned > 0 {
            debug!(removed, pruned, "Typing sweep completed");
        }
        removed
    }

    /// Periodic sweep until cancelled.
    pub async fn run_sweeper(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.config.sweep_interval();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        info!(interval_secs = period.as_secs(), "Typing sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Typing sweeper stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.sweep();
                }
            }
        }
    }

    /// Whether the user is typing in the conversation.
    pub fn is_typing(&self, conversation_id: ConversationId, user_id: UserId) -> bool {
        self.entries.contains_key(&(conversation_id, user_id))
    }

    /// Users typing in a conversation.
    pub fn typing_in(&self, conversation_id: ConversationId) -> Vec<UserId> {
        self.entries
            .iter()
            .filter(|entry| entry.key().0 == conversation_id)
            .map(|entry| entry.key().1)
            .collect()
    }

    /// Live indicators across all conversations.
    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    async fn display_name(&self, user_id: UserId) -> String {
        let Some(users) = self.users.as_ref() else {
            return user_id.to_string();
        };
        match users.find_by_id(user_id).await {
            Ok(Some(profile)) => profile.name_for_display().to_string(),
            Ok(None) => user_id.to_string(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Display name lookup failed");
                user_id.to_string()
            }
        }
    }
}
