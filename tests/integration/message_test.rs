//! Integration tests for sending messages.

use serde_json::json;

use chatline_core::config::RealtimeConfig;
use chatline_core::types::{ConversationId, ConversationKind, UserId};
use chatline_realtime::{Collaborators, InboundCommand, RealtimeEngine};

use crate::helpers::{self, TestApp, settle};

fn send_message(conversation_id: impl serde::Serialize, content: &str) -> InboundCommand {
    InboundCommand::new(
        "send_message",
        json!({
            "conversation_id": conversation_id,
            "content": content,
            "client_message_id": "local-1",
        }),
    )
    .with_request_id("m1")
}

#[tokio::test]
async fn test_message_reaches_other_subscribers() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let sender = UserId::new();
    let reader = UserId::new();
    let conversation = app.conversations.add(ConversationKind::Group, &[sender, reader]);

    let mut sender_client = app.connect(sender).await;
    let mut reader_client = app.connect(reader).await;
    settle().await;
    assert!(hub.conversation_subscribers(conversation).contains(&reader_client.conn.id));

    app.send(&sender_client, send_message(conversation, "hello there"))
        .await
        .unwrap();

    let ack = sender_client.expect("message_sent").await;
    assert_eq!(ack["request_id"], "m1");
    assert_eq!(ack["data"]["client_message_id"], "local-1");

    let message = reader_client.expect("new_message").await;
    assert_eq!(message["data"]["content"], "hello there");
    assert_eq!(message["data"]["sender_id"], sender.to_string());
    assert_eq!(message["data"]["message_id"], ack["data"]["message_id"]);

    settle().await;
    assert!(sender_client.frames_of("new_message").is_empty());
    assert_eq!(app.engine.stats().messages_sent, 1);
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_non_member_cannot_send() {
    let app = TestApp::new();
    let conversation = app.conversations.add(ConversationKind::Group, &[UserId::new()]);
    let mut client = app.connect(UserId::new()).await;

    let err = app
        .send(&client, send_message(conversation, "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "AUTHORIZATION");
    let failure = client.expect("error").await;
    assert_eq!(failure["request_id"], "m1");
    assert_eq!(failure["data"]["command"], "send_message");
    assert!(app.engine.hub().connection(client.conn.id).is_some());
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_block_in_either_direction_rejects_direct_message() {
    let app = TestApp::new();
    let alice = UserId::new();
    let bob = UserId::new();
    let conversation = app.conversations.add(ConversationKind::Direct, &[alice, bob]);
    let alice_client = app.connect(alice).await;
    let bob_client = app.connect(bob).await;

    app.friendships.block(bob, alice);

    let err = app
        .send(&alice_client, send_message(conversation, "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "AUTHORIZATION");

    let err = app
        .send(&bob_client, send_message(conversation, "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "AUTHORIZATION");
    assert_eq!(app.engine.stats().messages_sent, 0);
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_content_validation() {
    let app = TestApp::new();
    let sender = UserId::new();
    let conversation = app.conversations.add(ConversationKind::Group, &[sender]);
    let client = app.connect(sender).await;

    let err = app
        .send(&client, send_message(conversation, "   "))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");

    let too_long = "x".repeat(10_001);
    let err = app
        .send(&client, send_message(conversation, &too_long))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");

    let err = app
        .send(&client, send_message("not-a-uuid", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_offline_members_are_notified() {
    let app = TestApp::with_config(RealtimeConfig {
        eager_subscribe_limit: 0,
        ..helpers::test_config()
    });
    let hub = app.engine.hub();
    let sender = UserId::new();
    let watching = UserId::new();
    let connected_elsewhere = UserId::new();
    let offline = UserId::new();
    let conversation = app.conversations.add(
        ConversationKind::Group,
        &[sender, watching, connected_elsewhere, offline],
    );

    let sender_client = app.connect(sender).await;
    let watching_client = app.connect(watching).await;
    let _elsewhere = app.connect(connected_elsewhere).await;
    hub.subscribe_conversation(watching_client.conn.id, conversation);

    app.send(&sender_client, send_message(conversation, "ping everyone"))
        .await
        .unwrap();
    settle().await;

    let mut recipients = app.notifications.recipients();
    recipients.sort();
    let mut expected = vec![connected_elsewhere, offline];
    expected.sort();
    assert_eq!(recipients, expected);

    let notices = app.notifications.notices.lock().unwrap();
    assert_eq!(notices[0].1.preview, "ping everyone");
    drop(notices);
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_missing_conversation_service_is_unavailable() {
    let engine = RealtimeEngine::start(helpers::test_config(), Collaborators::new());
    let (conn, _rx) = engine.connect(UserId::new(), None).await.unwrap();

    let err = engine
        .dispatcher()
        .dispatch(&conn, send_message(ConversationId::new(), "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
    engine.shutdown().await;
}
