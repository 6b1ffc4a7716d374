//! Minimum-spacing limiter keyed by an arbitrary id.

use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

/// Admits at most one action per key per `min_interval`.
///
/// Only admitted actions move the window; a rejected attempt does not
/// push the next admission further out.
#[derive(Debug)]
pub struct IntervalLimiter<K: Eq + Hash> {
    min_interval: Duration,
    last_admitted: DashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> IntervalLimiter<K> {
    /// Create a limiter with the given spacing.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_admitted: DashMap::new(),
        }
    }

    /// Admit the action for `key` if the spacing has elapsed.
    pub fn try_acquire(&self, key: &K) -> bool {
        let now = Instant::now();
        match self.last_admitted.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.min_interval {
                    return false;
                }
                entry.insert(now);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Drop bookkeeping for keys last admitted more than `older_than` ago.
    pub fn prune(&self, older_than: Duration) -> usize {
        let now = Instant::now();
        let before = self.last_admitted.len();
        self.last_admitted
            .retain(|_, admitted| now.duration_since(*admitted) < older_than);
        before.saturating_sub(self.last_admitted.len())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.last_admitted.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.last_admitted.is_empty()
    }
}
