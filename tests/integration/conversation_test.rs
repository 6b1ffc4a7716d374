//! Integration tests for conversation subscription and management commands.

use serde_json::json;

use chatline_core::types::{ConversationKind, UserId};
use chatline_realtime::InboundCommand;

use crate::helpers::{TestApp, settle};

#[tokio::test]
async fn test_join_requires_membership() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let member = UserId::new();
    let outsider = UserId::new();
    let conversation = app.conversations.add(ConversationKind::Group, &[member]);

    let mut insider = app.connect(member).await;
    let mut stranger = app.connect(outsider).await;
    let join = || {
        InboundCommand::new("join_conversation", json!({ "conversation_id": conversation }))
            .with_request_id("j1")
    };

    app.send(&insider, join()).await.unwrap();
    let ack = insider.expect("conversation_joined").await;
    assert_eq!(ack["request_id"], "j1");
    assert!(ack["success"].as_bool().unwrap());

    let err = app.send(&stranger, join()).await.unwrap_err();
    assert_eq!(err.code(), "AUTHORIZATION");
    let failure = stranger.expect("error").await;
    assert_eq!(failure["data"]["code"], "AUTHORIZATION");

    let subscribers = hub.conversation_subscribers(conversation);
    assert!(subscribers.contains(&insider.conn.id));
    assert!(!subscribers.contains(&stranger.conn.id));
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_membership_check_error_fails_command() {
    let app = TestApp::new();
    let conversation = app.conversations.add(ConversationKind::Group, &[]);
    let mut client = app.connect(UserId::new()).await;
    app.conversations.fail_membership_checks();

    let err = app
        .send(
            &client,
            InboundCommand::new("join_conversation", json!({ "conversation_id": conversation })),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "EXTERNAL_SERVICE");
    assert_eq!(client.expect("error").await["success"], false);
    assert!(app.engine.hub().conversation_subscribers(conversation).is_empty());
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_leave_is_idempotent() {
    let app = TestApp::new();
    let user = UserId::new();
    let conversation = app.conversations.add(ConversationKind::Group, &[user]);
    let mut client = app.connect(user).await;
    let leave = || InboundCommand::new("leave_conversation", json!({ "conversation_id": conversation }));

    app.send(&client, leave()).await.unwrap();
    app.send(&client, leave()).await.unwrap();
    let acks = {
        settle().await;
        client.frames_of("conversation_left")
    };
    assert_eq!(acks.len(), 2);
    assert!(app.engine.hub().conversation_subscribers(conversation).is_empty());
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_active_conversation_notices() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let alice = UserId::new();
    let bob = UserId::new();
    let first = app.conversations.add(ConversationKind::Group, &[alice, bob]);
    let second = app.conversations.add(ConversationKind::Group, &[alice, bob]);

    let alice_client = app.connect(alice).await;
    let mut bob_client = app.connect(bob).await;
    hub.subscribe_conversation(bob_client.conn.id, first);
    hub.subscribe_conversation(bob_client.conn.id, second);

    let set_active = |id| InboundCommand::new("set_active_conversation", json!({ "conversation_id": id }));
    app.send(&alice_client, set_active(first)).await.unwrap();
    settle().await;
    let active = bob_client.frames_of("user_active_in_conversation");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["data"]["conversation_id"], first.to_string());

    app.send(&alice_client, set_active(second)).await.unwrap();
    settle().await;
    let frames = bob_client.drain();
    assert!(frames.iter().any(|f| {
        f["type"] == "user_inactive_in_conversation" && f["data"]["conversation_id"] == first.to_string()
    }));
    assert!(frames.iter().any(|f| {
        f["type"] == "user_active_in_conversation" && f["data"]["conversation_id"] == second.to_string()
    }));

    // Disconnecting while active tells the conversation.
    app.engine.disconnect(alice_client.conn.id).await.unwrap();
    settle().await;
    assert_eq!(bob_client.frames_of("user_inactive_in_conversation").len(), 1);
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_get_conversations_and_members() {
    let app = TestApp::new();
    let user = UserId::new();
    let other = UserId::new();
    let conversation = app.conversations.add(ConversationKind::Direct, &[user, other]);
    app.conversations.add(ConversationKind::Group, &[user]);
    let mut client = app.connect(user).await;

    app.send(&client, InboundCommand::new("get_conversations", json!({ "limit": 10 })))
        .await
        .unwrap();
    let listing = client.expect("conversations").await;
    assert_eq!(listing["data"]["total"], 2);
    assert_eq!(listing["data"]["items"].as_array().unwrap().len(), 2);

    app.send(
        &client,
        InboundCommand::new("get_conversation_members", json!({ "conversation_id": conversation })),
    )
    .await
    .unwrap();
    let members = client.expect("conversation_members").await;
    assert_eq!(members["data"]["total"], 2);
    assert_eq!(members["data"]["page"], 1);

    let err = app
        .send(&client, InboundCommand::new("get_conversations", json!({ "limit": 0 })))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_create_direct_conversation() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let creator = UserId::new();
    let other = UserId::new();
    let mut creator_client = app.connect(creator).await;
    let mut other_client = app.connect(other).await;

    app.send(
        &creator_client,
        InboundCommand::new("create_direct_conversation", json!({ "user_id": other })),
    )
    .await
    .unwrap();

    let ack = creator_client.expect("conversation_created").await;
    let pushed = other_client.expect("conversation_created").await;
    assert_eq!(ack["data"]["conversation"]["kind"], "direct");
    assert_eq!(pushed["data"]["created_by"], creator.to_string());

    let conversation_id = ack["data"]["conversation"]["id"].as_str().unwrap().parse().unwrap();
    assert!(hub.conversation_subscribers(conversation_id).contains(&creator_client.conn.id));
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_create_direct_rejected_when_blocked() {
    let app = TestApp::new();
    let creator = UserId::new();
    let other = UserId::new();
    app.friendships.block(other, creator);
    let mut client = app.connect(creator).await;

    let err = app
        .send(&client, InboundCommand::new("create_direct_conversation", json!({ "user_id": other })))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "AUTHORIZATION");
    assert!(client.frames_of("conversation_created").is_empty());

    let err = app
        .send(&client, InboundCommand::new("create_direct_conversation", json!({ "user_id": creator })))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_create_group_conversation_notifies_members() {
    let app = TestApp::new();
    let creator = UserId::new();
    let first = UserId::new();
    let second = UserId::new();
    let mut creator_client = app.connect(creator).await;
    let mut first_client = app.connect(first).await;
    let mut second_client = app.connect(second).await;

    app.send(
        &creator_client,
        InboundCommand::new(
            "create_group_conversation",
            json!({ "name": " Launch ", "member_ids": [first, second, first, creator] }),
        ),
    )
    .await
    .unwrap();

    let ack = creator_client.expect("conversation_created").await;
    assert_eq!(ack["data"]["conversation"]["name"], "Launch");
    assert_eq!(ack["data"]["conversation"]["member_count"], 3);
    first_client.expect("conversation_created").await;
    second_client.expect("conversation_created").await;

    let err = app
        .send(
            &creator_client,
            InboundCommand::new("create_group_conversation", json!({ "name": "", "member_ids": [first] })),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
    app.engine.shutdown().await;
}
