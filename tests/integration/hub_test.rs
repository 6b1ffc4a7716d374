//! Integration tests for registration, fan-out and eviction.

use serde_json::json;

use chatline_core::config::RealtimeConfig;
use chatline_core::types::{BusinessId, ConversationId, ConversationKind, UserId};
use chatline_realtime::{BroadcastMessage, InboundCommand};

use crate::helpers::{self, TestApp, settle};

#[tokio::test]
async fn test_online_tracks_connection_set() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let user = UserId::new();

    let a = app.connect(user).await;
    let b = app.connect(user).await;
    assert!(hub.is_user_online(user));

    app.engine.disconnect(a.conn.id).await.unwrap();
    assert!(hub.is_user_online(user));

    app.engine.disconnect(b.conn.id).await.unwrap();
    assert!(!hub.is_user_online(user));

    let c = app.connect(user).await;
    assert!(hub.is_user_online(user));
    app.engine.disconnect(c.conn.id).await.unwrap();
    assert!(!hub.is_user_online(user));
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_unregister_purges_every_index() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let conversation = ConversationId::new();
    let watched = UserId::new();

    let client = app.connect(UserId::new()).await;
    assert!(hub.subscribe_conversation(client.conn.id, conversation));
    assert!(hub.presence().subscribe(hub, client.conn.id, watched).is_some());

    app.engine.disconnect(client.conn.id).await.unwrap();

    assert!(hub.connection(client.conn.id).is_none());
    assert!(hub.conversation_subscribers(conversation).is_empty());
    assert!(hub.user_status_subscribers(watched).is_empty());
    let stats = hub.stats();
    assert_eq!(stats.subscribed_conversations, 0);
    assert_eq!(stats.watched_users, 0);
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_exclude_skips_only_that_connection() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let conversation = ConversationId::new();

    let mut a = app.connect(UserId::new()).await;
    let mut b = app.connect(UserId::new()).await;
    let mut c = app.connect(UserId::new()).await;
    for client in [&a, &b, &c] {
        hub.subscribe_conversation(client.conn.id, conversation);
    }

    hub.notify_conversation(conversation, "new_message", json!({"x": 1}), Some(b.conn.id));
    settle().await;

    assert_eq!(a.frames_of("new_message").len(), 1);
    assert_eq!(b.frames_of("new_message").len(), 0);
    assert_eq!(c.frames_of("new_message").len(), 1);
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_empty_targets_deliver_nothing() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let mut client = app.connect(UserId::new()).await;

    hub.notify_conversation(ConversationId::new(), "new_message", json!({}), None);
    hub.notify(BroadcastMessage::to_users(Vec::new(), "ping", json!({})));
    settle().await;

    assert!(client.drain().is_empty());
    assert_eq!(hub.stats().metrics.evictions, 0);
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_user_and_business_targets_reach_every_connection() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let user = UserId::new();

    let mut phone = app.connect(user).await;
    let mut laptop = app.connect(user).await;

    hub.notify_user(user, "account_updated", json!({}));
    hub.notify_business(BusinessId::new(), vec![user], "business_announcement", json!({}));
    settle().await;

    for client in [&mut phone, &mut laptop] {
        let frames = client.drain();
        assert!(frames.iter().any(|f| f["type"] == "account_updated"));
        assert!(frames.iter().any(|f| f["type"] == "business_announcement"));
    }
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_saturated_connection_is_evicted_everywhere() {
    let app = TestApp::with_config(RealtimeConfig {
        send_buffer_size: 2,
        ..helpers::test_config()
    });
    let hub = app.engine.hub();
    let conversation = ConversationId::new();
    let watched = UserId::new();

    let stuck = app.connect(UserId::new()).await;
    let mut healthy = app.connect(UserId::new()).await;
    hub.subscribe_conversation(stuck.conn.id, conversation);
    hub.subscribe_conversation(healthy.conn.id, conversation);
    hub.presence().subscribe(hub, stuck.conn.id, watched);

    for n in 0..3 {
        hub.notify_conversation(conversation, "tick", json!({ "n": n }), None);
        settle().await;
        healthy.drain();
    }

    assert!(hub.connection(stuck.conn.id).is_none());
    assert!(!stuck.conn.is_alive());
    assert_eq!(hub.conversation_subscribers(conversation), vec![healthy.conn.id]);
    assert!(hub.user_status_subscribers(watched).is_empty());
    assert!(hub.connection(healthy.conn.id).is_some());
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_eager_subscription_on_register() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let user = UserId::new();
    let conversations: Vec<ConversationId> = (0..7)
        .map(|_| app.conversations.add(ConversationKind::Group, &[user]))
        .collect();

    let client = app.connect(user).await;
    settle().await;

    let subscribed = conversations
        .iter()
        .filter(|id| hub.conversation_subscribers(**id).contains(&client.conn.id))
        .count();
    assert_eq!(subscribed, 5);
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_diagnostics_snapshot() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let user = UserId::new();
    let client = app.connect(user).await;

    let connections = hub.all_connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].user_id, user);
    assert_eq!(connections[0].id, client.conn.id);

    let stats = app.engine.stats();
    assert_eq!(stats.total_connections, 1);
    assert_eq!(stats.online_users, 1);
    assert_eq!(stats.metrics.connections_opened, 1);
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_registration_survives_listing_failure() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let user = UserId::new();
    let conversation = app.conversations.add(ConversationKind::Group, &[user]);
    app.conversations.fail_listings();

    let mut client = app.connect(user).await;
    settle().await;

    assert!(hub.is_registered(client.conn.id));
    assert!(hub.is_user_online(user));
    assert!(hub.conversation_subscribers(conversation).is_empty());

    // The connection is fully usable; joining still works.
    app.send(
        &client,
        InboundCommand::new(
            "join_conversation",
            json!({ "conversation_id": conversation }),
        ),
    )
    .await
    .unwrap();
    client.expect("conversation_joined").await;
    assert_eq!(hub.conversation_subscribers(conversation), vec![client.conn.id]);
    app.engine.shutdown().await;
}
