//! Individual connection handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use chatline_core::types::id::{BusinessId, ConnectionId, ConversationId, UserId};

use crate::ratelimit::TokenBucket;

/// Result of a non-blocking push into a connection's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame queued for the writer loop.
    Sent,
    /// Queue is at capacity; the consumer is not keeping up.
    Full,
    /// Queue was closed (connection unregistered or writer gone).
    Closed,
}

/// A handle to a single live connection.
///
/// Holds the sending half of the outbound frame queue plus identity and
/// liveness metadata. The writer loop owns the receiving half.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// User who owns this connection.
    pub user_id: UserId,
    /// Business context the user connected under, if any.
    pub business_id: Option<BusinessId>,
    /// When the connection was established.
    pub connected_at: DateTime<Utc>,
    /// Outbound queue; `None` once closed.
    sender: RwLock<Option<mpsc::Sender<Bytes>>>,
    /// Conversation currently on screen.
    active_conversation: RwLock<Option<ConversationId>>,
    /// Last ping received.
    last_heartbeat: Mutex<Instant>,
    /// Cleared when the queue is closed.
    alive: AtomicBool,
    /// Command admission.
    limiter: TokenBucket,
}

impl ConnectionHandle {
    /// Create a handle and the receiving half of its outbound queue.
    pub fn new(
        user_id: UserId,
        business_id: Option<BusinessId>,
        buffer_size: usize,
        limiter: TokenBucket,
    ) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            user_id,
            business_id,
            connected_at: Utc::now(),
            sender: RwLock::new(Some(tx)),
            active_conversation: RwLock::new(None),
            last_heartbeat: Mutex::new(Instant::now()),
            alive: AtomicBool::new(true),
            limiter,
        };
        (handle, rx)
    }

    /// Push a frame without waiting.
    pub fn try_send(&self, frame: Bytes) -> SendOutcome {
        let guard = self.sender.read().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = guard.as_ref() else {
            return SendOutcome::Closed;
        };
        match tx.try_send(frame) {
            Ok(()) => SendOutcome::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => SendOutcome::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Close the outbound queue.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        let mut guard = self.sender.write().unwrap_or_else(|e| e.into_inner());
        self.alive.store(false, Ordering::SeqCst);
        guard.take().is_some()
    }

    /// Whether the outbound queue is still open.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Refresh the heartbeat timestamp.
    pub fn touch(&self) {
        *self.last_heartbeat.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    /// Time since the last heartbeat.
    pub fn idle_for(&self) -> Duration {
        let last = *self.last_heartbeat.lock().unwrap_or_else(|e| e.into_inner());
        Instant::now().saturating_duration_since(last)
    }

    /// Active conversation, if any.
    pub fn active_conversation(&self) -> Option<ConversationId> {
        *self
            .active_conversation
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the active conversation, returning the previous one.
    pub fn set_active_conversation(
        &self,
        conversation_id: Option<ConversationId>,
    ) -> Option<ConversationId> {
        let mut guard = self
            .active_conversation
            .write()
            .unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, conversation_id)
    }

    /// Clear the active conversation only if it is `conversation_id`.
    pub fn clear_active_conversation_if(&self, conversation_id: ConversationId) -> bool {
        let mut guard = self
            .active_conversation
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if *guard == Some(conversation_id) {
            *guard = None;
            true
        } else {
            false
        }
    }

    /// Take one command token.
    pub fn admit_command(&self) -> bool {
        self.limiter.try_acquire()
    }

    /// Serializable snapshot.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            user_id: self.user_id,
            business_id: self.business_id,
            active_conversation: self.active_conversation(),
            connected_at: self.connected_at,
            idle_seconds: self.idle_for().as_secs(),
            alive: self.is_alive(),
        }
    }
}

/// Snapshot of connection state for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Connection ID.
    pub id: ConnectionId,
    /// User ID.
    pub user_id: UserId,
    /// Business context.
    pub business_id: Option<BusinessId>,
    /// Active conversation.
    pub active_conversation: Option<ConversationId>,
    /// Connected at.
    pub connected_at: DateTime<Utc>,
    /// Seconds since the last heartbeat.
    pub idle_seconds: u64,
    /// Is alive.
    pub alive: bool,
}
