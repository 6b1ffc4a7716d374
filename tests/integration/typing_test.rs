//! Integration tests for typing indicators.

use std::time::Duration;

use serde_json::json;

use chatline_core::types::{ConversationKind, UserId};
use chatline_realtime::InboundCommand;

use crate::helpers::{TestApp, settle};

#[tokio::test(start_paused = true)]
async fn test_typing_start_rate_limited_per_conversation() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let typist = app.users.add("ada", Some("Ada Lovelace"));
    let reader = UserId::new();
    let conversation = app
        .conversations
        .add(ConversationKind::Group, &[typist, reader]);

    let writer = app.connect(typist).await;
    let mut watcher = app.connect(reader).await;
    hub.subscribe_conversation(writer.conn.id, conversation);
    hub.subscribe_conversation(watcher.conn.id, conversation);

    let start = || InboundCommand::new("typing_start", json!({ "conversation_id": conversation }));
    app.send(&writer, start()).await.unwrap();
    tokio::time::advance(Duration::from_millis(300)).await;
    app.send(&writer, start()).await.unwrap();
    settle().await;

    let started = watcher.frames_of("typing_started");
    assert_eq!(started.len(), 1);
    assert_eq!(started[0]["data"]["display_name"], "Ada Lovelace");

    // Allowed again once the window has passed.
    tokio::time::advance(Duration::from_millis(800)).await;
    app.send(&writer, start()).await.unwrap();
    settle().await;
    assert_eq!(watcher.frames_of("typing_started").len(), 1);
    app.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_typing_auto_stop_broadcasts_once() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let typist = UserId::new();
    let reader = UserId::new();
    let conversation = app
        .conversations
        .add(ConversationKind::Group, &[typist, reader]);

    let writer = app.connect(typist).await;
    let mut watcher = app.connect(reader).await;
    hub.subscribe_conversation(writer.conn.id, conversation);
    hub.subscribe_conversation(watcher.conn.id, conversation);

    app.send(
        &writer,
        InboundCommand::new("typing_start", json!({ "conversation_id": conversation })),
    )
    .await
    .unwrap();
    settle().await;
    let frames = watcher.drain();
    assert!(frames.iter().any(|f| f["type"] == "typing_started"));
    assert!(
        frames
            .iter()
            .any(|f| f["type"] == "user_typing" && f["data"]["is_typing"] == true)
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(20)).await;
    settle().await;

    let frames = watcher.drain();
    let stopped: Vec<_> = frames.iter().filter(|f| f["type"] == "typing_stopped").collect();
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0]["data"]["user_id"], typist.to_string());
    assert!(
        frames
            .iter()
            .any(|f| f["type"] == "user_typing" && f["data"]["is_typing"] == false)
    );
    assert!(!hub.typing().is_typing(conversation, typist));
    app.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_stop_is_not_rate_limited() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let typist = UserId::new();
    let reader = UserId::new();
    let conversation = app
        .conversations
        .add(ConversationKind::Group, &[typist, reader]);

    let writer = app.connect(typist).await;
    let mut watcher = app.connect(reader).await;
    hub.subscribe_conversation(watcher.conn.id, conversation);

    let start = InboundCommand::new("typing_start", json!({ "conversation_id": conversation }));
    let stop = InboundCommand::new("typing_stop", json!({ "conversation_id": conversation }));
    app.send(&writer, start).await.unwrap();
    app.send(&writer, stop.clone()).await.unwrap();
    app.send(&writer, stop).await.unwrap();
    settle().await;

    assert_eq!(watcher.frames_of("typing_stopped").len(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;
    assert!(watcher.frames_of("typing_stopped").is_empty());
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_typing_errors_are_silent() {
    let app = TestApp::new();
    let mut writer = app.connect(UserId::new()).await;

    let result = app
        .send(&writer, InboundCommand::new("typing_start", json!({ "conversation_id": 7 })))
        .await;
    assert!(result.is_err());
    settle().await;
    assert!(writer.drain().is_empty());
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_outsider_typing_reaches_nobody() {
    let app = TestApp::new();
    let hub = app.engine.hub();
    let alice = UserId::new();
    let bob = UserId::new();
    let conversation = app.conversations.add(ConversationKind::Direct, &[alice, bob]);

    let mut bob_client = app.connect(bob).await;
    let mut outsider = app.connect(UserId::new()).await;
    hub.subscribe_conversation(bob_client.conn.id, conversation);

    let err = app
        .send(
            &outsider,
            InboundCommand::new("typing_start", json!({ "conversation_id": conversation })),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "AUTHORIZATION");
    settle().await;

    assert!(bob_client.drain().is_empty());
    assert!(outsider.drain().is_empty());
    assert!(!hub.typing().is_typing(conversation, outsider.conn.user_id));
    app.engine.shutdown().await;
}
