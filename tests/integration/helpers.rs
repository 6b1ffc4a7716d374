//! Shared test helpers for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;

use chatline_core::config::RealtimeConfig;
use chatline_core::error::{AppError, AppResult};
use chatline_core::traits::{
    ConversationMemberService, ConversationService, FriendshipService, MessageNotice,
    NotificationService, UserRepository,
};
use chatline_core::types::{
    BlockStatus, ConversationId, ConversationKind, ConversationMember, ConversationOrder,
    ConversationPage, ConversationSummary, MemberPage, UserId, UserProfile,
};
use chatline_realtime::{Collaborators, ConnectionHandle, InboundCommand, RealtimeEngine};

/// In-memory conversations and memberships.
#[derive(Default)]
pub struct FakeConversations {
    conversations: Mutex<HashMap<ConversationId, (ConversationKind, Vec<UserId>)>>,
    fail_membership: AtomicBool,
    fail_listing: AtomicBool,
}

impl FakeConversations {
    pub fn add(&self, kind: ConversationKind, members: &[UserId]) -> ConversationId {
        let id = ConversationId::new();
        self.conversations
            .lock()
            .unwrap()
            .insert(id, (kind, members.to_vec()));
        id
    }

    /// Make every membership check error out.
    pub fn fail_membership_checks(&self) {
        self.fail_membership.store(true, Ordering::SeqCst);
    }

    /// Make every conversation listing error out.
    pub fn fail_listings(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    fn summary(id: ConversationId, kind: ConversationKind, members: &[UserId]) -> ConversationSummary {
        ConversationSummary {
            id,
            kind,
            name: None,
            member_count: members.len() as u32,
            updated_at: Utc::now(),
        }
    }
}

#[async_trait]
impl ConversationService for FakeConversations {
    async fn check_membership(
        &self,
        user_id: UserId,
        conversation_id: ConversationId,
    ) -> AppResult<bool> {
        if self.fail_membership.load(Ordering::SeqCst) {
            return Err(AppError::external("membership store unreachable"));
        }
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .get(&conversation_id)
            .is_some_and(|(_, members)| members.contains(&user_id)))
    }

    async fn get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> AppResult<ConversationSummary> {
        let conversations = self.conversations.lock().unwrap();
        let (kind, members) = conversations
            .get(&conversation_id)
            .ok_or_else(|| AppError::not_found("conversation"))?;
        Ok(Self::summary(conversation_id, *kind, members))
    }

    async fn get_user_conversations(
        &self,
        user_id: UserId,
        limit: u32,
        offset: u32,
        _order: ConversationOrder,
        _include_archived: bool,
    ) -> AppResult<ConversationPage> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(AppError::external("conversation listing unavailable"));
        }
        let conversations = self.conversations.lock().unwrap();
        let mine: Vec<ConversationSummary> = conversations
            .iter()
            .filter(|(_, (_, members))| members.contains(&user_id))
            .map(|(id, (kind, members))| Self::summary(*id, *kind, members))
            .collect();
        let total = mine.len() as u64;
        Ok(ConversationPage {
            items: mine
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect(),
            total,
        })
    }

    async fn create_direct_conversation(
        &self,
        creator_id: UserId,
        other_user_id: UserId,
    ) -> AppResult<ConversationSummary> {
        let members = [creator_id, other_user_id];
        let id = self.add(ConversationKind::Direct, &members);
        Ok(Self::summary(id, ConversationKind::Direct, &members))
    }

    async fn create_group_conversation(
        &self,
        creator_id: UserId,
        name: &str,
        member_ids: &[UserId],
    ) -> AppResult<ConversationSummary> {
        let mut members = vec![creator_id];
        members.extend_from_slice(member_ids);
        let id = self.add(ConversationKind::Group, &members);
        let mut summary = Self::summary(id, ConversationKind::Group, &members);
        summary.name = Some(name.to_string());
        Ok(summary)
    }
}

#[async_trait]
impl ConversationMemberService for FakeConversations {
    async fn get_members(
        &self,
        _requester_id: UserId,
        conversation_id: ConversationId,
        page: u32,
        page_size: u32,
    ) -> AppResult<MemberPage> {
        let conversations = self.conversations.lock().unwrap();
        let (_, members) = conversations
            .get(&conversation_id)
            .ok_or_else(|| AppError::not_found("conversation"))?;
        let skip = (page.saturating_sub(1) * page_size) as usize;
        Ok(MemberPage {
            items: members
                .iter()
                .skip(skip)
                .take(page_size as usize)
                .map(|user_id| ConversationMember {
                    user_id: *user_id,
                    role: "member".to_string(),
                    joined_at: Utc::now(),
                })
                .collect(),
            total: members.len() as u64,
        })
    }
}

/// Directed block list.
#[derive(Default)]
pub struct FakeFriendships {
    blocks: Mutex<HashSet<(UserId, UserId)>>,
}

impl FakeFriendships {
    pub fn block(&self, blocker: UserId, blocked: UserId) {
        self.blocks.lock().unwrap().insert((blocker, blocked));
    }
}

#[async_trait]
impl FriendshipService for FakeFriendships {
    async fn check_block_status(&self, user_id: UserId, other_id: UserId) -> AppResult<BlockStatus> {
        let blocks = self.blocks.lock().unwrap();
        Ok(BlockStatus {
            is_blocked: blocks.contains(&(user_id, other_id)),
            is_blocked_by: blocks.contains(&(other_id, user_id)),
        })
    }
}

/// Profiles keyed by user.
#[derive(Default)]
pub struct FakeUsers {
    profiles: Mutex<HashMap<UserId, UserProfile>>,
}

impl FakeUsers {
    pub fn add(&self, username: &str, display_name: Option<&str>) -> UserId {
        let id = UserId::new();
        self.profiles.lock().unwrap().insert(
            id,
            UserProfile {
                id,
                username: username.to_string(),
                display_name: display_name.map(str::to_string),
            },
        );
        id
    }
}

#[async_trait]
impl UserRepository for FakeUsers {
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserProfile>> {
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }
}

/// Records offline notices.
#[derive(Default)]
pub struct RecordingNotifications {
    pub notices: Mutex<Vec<(UserId, MessageNotice)>>,
}

impl RecordingNotifications {
    pub fn recipients(&self) -> Vec<UserId> {
        self.notices.lock().unwrap().iter().map(|(user, _)| *user).collect()
    }
}

#[async_trait]
impl NotificationService for RecordingNotifications {
    async fn notify_new_message(&self, recipient_id: UserId, notice: &MessageNotice) -> AppResult<()> {
        self.notices
            .lock()
            .unwrap()
            .push((recipient_id, notice.clone()));
        Ok(())
    }
}

/// Engine wired to the in-memory fakes.
pub struct TestApp {
    pub engine: RealtimeEngine,
    pub conversations: Arc<FakeConversations>,
    pub friendships: Arc<FakeFriendships>,
    pub users: Arc<FakeUsers>,
    pub notifications: Arc<RecordingNotifications>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: RealtimeConfig) -> Self {
        let conversations = Arc::new(FakeConversations::default());
        let friendships = Arc::new(FakeFriendships::default());
        let users = Arc::new(FakeUsers::default());
        let notifications = Arc::new(RecordingNotifications::default());

        let collaborators = Collaborators::new()
            .with_conversations(conversations.clone())
            .with_members(conversations.clone())
            .with_friendships(friendships.clone())
            .with_users(users.clone());

        let engine = RealtimeEngine::start(config, collaborators);
        engine.set_notification_service(notifications.clone());

        Self {
            engine,
            conversations,
            friendships,
            users,
            notifications,
        }
    }

    /// Connect `user_id` and discard the frames produced by registration.
    pub async fn connect(&self, user_id: UserId) -> TestClient {
        let (conn, rx) = self.engine.connect(user_id, None).await.unwrap();
        let mut client = TestClient { conn, rx };
        settle().await;
        client.drain();
        client
    }

    pub async fn send(&self, client: &TestClient, command: InboundCommand) -> AppResult<()> {
        self.engine.dispatcher().dispatch(&client.conn, command).await
    }
}

/// One connected client.
pub struct TestClient {
    pub conn: Arc<ConnectionHandle>,
    pub rx: mpsc::Receiver<Bytes>,
}

impl TestClient {
    /// Every frame currently queued.
    pub fn drain(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(bytes) = self.rx.try_recv() {
            frames.push(serde_json::from_slice(&bytes).unwrap());
        }
        frames
    }

    /// Queued frames of one type.
    pub fn frames_of(&mut self, frame_type: &str) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter(|frame| frame["type"] == frame_type)
            .collect()
    }

    /// Wait for the next frame of `frame_type`, skipping others.
    pub async fn expect(&mut self, frame_type: &str) -> Value {
        let deadline = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let Some(bytes) = self.rx.recv().await else {
                    panic!("connection closed while waiting for {frame_type}");
                };
                let frame: Value = serde_json::from_slice(&bytes).unwrap();
                if frame["type"] == frame_type {
                    return frame;
                }
            }
        });
        deadline
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {frame_type}"))
    }
}

/// Defaults with a zero presence settle delay so tests do not sleep.
pub fn test_config() -> RealtimeConfig {
    RealtimeConfig {
        presence_settle_delay_ms: 0,
        ..RealtimeConfig::default()
    }
}

/// Let spawned tasks (control loop, presence worker) catch up.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
