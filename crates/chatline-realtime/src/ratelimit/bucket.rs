//! Token bucket with a full refill once per interval.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// Per-connection command admission.
///
/// The bucket starts full. Every admitted action takes one token; once
/// `interval` has passed since the last refill the bucket is topped back
/// up to `capacity` in one step.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    interval: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, interval: Duration) -> Self {
        Self {
            capacity,
            interval,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token if available.
    ///
    /// A zero-capacity bucket admits everything.
    pub fn try_acquire(&self) -> bool {
        if self.capacity == 0 {
            return true;
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if now.duration_since(state.last_refill) >= self.interval {
            state.tokens = self.capacity;
            state.last_refill = now;
        }

        if state.tokens == 0 {
            return false;
        }
        state.tokens -= 1;
        true
    }

    /// Tokens left in the current interval.
    pub fn remaining(&self) -> u32 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).tokens
    }

    /// Bucket capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
