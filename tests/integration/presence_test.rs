//! Integration tests for presence watching.

use std::time::Duration;

use serde_json::json;

use chatline_core::config::RealtimeConfig;
use chatline_core::types::UserId;
use chatline_realtime::InboundCommand;

use crate::helpers::{self, TestApp, settle};

#[tokio::test]
async fn test_subscribe_returns_current_status() {
    let app = TestApp::new();
    let target = UserId::new();
    let mut watcher = app.connect(UserId::new()).await;

    let subscribe = InboundCommand::new("subscribe_user_status", json!({ "user_id": target }))
        .with_request_id("s1");
    app.send(&watcher, subscribe.clone()).await.unwrap();
    let frame = watcher.expect("user_status").await;
    assert_eq!(frame["request_id"], "s1");
    assert_eq!(frame["data"]["status"], "offline");

    let _online = app.connect(target).await;
    app.send(&watcher, subscribe).await.unwrap();
    let frame = watcher.expect("user_status").await;
    assert_eq!(frame["data"]["status"], "online");
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_watchers_follow_transitions() {
    let app = TestApp::new();
    let target = UserId::new();
    let mut watcher = app.connect(UserId::new()).await;
    app.send(
        &watcher,
        InboundCommand::new("subscribe_user_status", json!({ "user_id": target })),
    )
    .await
    .unwrap();
    watcher.drain();

    let first = app.connect(target).await;
    let second = app.connect(target).await;
    assert_eq!(watcher.frames_of("user_online").len(), 1);

    app.engine.disconnect(first.conn.id).await.unwrap();
    settle().await;
    assert!(watcher.frames_of("user_offline").is_empty());

    app.engine.disconnect(second.conn.id).await.unwrap();
    let offline = watcher.expect("user_offline").await;
    assert_eq!(offline["data"]["user_id"], target.to_string());
    assert!(offline["data"]["last_seen"].is_string());
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_unsubscribe_stops_updates() {
    let app = TestApp::new();
    let target = UserId::new();
    let mut watcher = app.connect(UserId::new()).await;

    app.send(&watcher, InboundCommand::new("subscribe_user_status", json!({ "user_id": target })))
        .await
        .unwrap();
    app.send(&watcher, InboundCommand::new("unsubscribe_user_status", json!({ "user_id": target })))
        .await
        .unwrap();
    let ack = watcher.expect("user_status_unsubscribed").await;
    assert_eq!(ack["data"]["was_subscribed"], true);

    // Second unsubscribe is harmless.
    app.send(&watcher, InboundCommand::new("unsubscribe_user_status", json!({ "user_id": target })))
        .await
        .unwrap();
    let ack = watcher.expect("user_status_unsubscribed").await;
    assert_eq!(ack["data"]["was_subscribed"], false);

    let _target = app.connect(target).await;
    assert!(watcher.frames_of("user_online").is_empty());
    app.engine.shutdown().await;
}

#[tokio::test]
async fn test_new_connection_gets_own_confirmation() {
    let app = TestApp::new();
    let user = UserId::new();
    let (_conn, mut rx) = app.engine.connect(user, None).await.unwrap();
    settle().await;

    let bytes = rx.try_recv().unwrap();
    let frame: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(frame["type"], "user_online");
    assert_eq!(frame["data"]["user_id"], user.to_string());
    app.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_settle_delay_pushes_watched_statuses() {
    let app = TestApp::with_config(RealtimeConfig {
        presence_settle_delay_ms: 500,
        ..helpers::test_config()
    });
    let hub = app.engine.hub();
    let online_friend = UserId::new();
    let _friend = app.connect(online_friend).await;

    // Reconnecting user whose watch list already names the friend.
    let me = UserId::new();
    let (conn, mut rx) = hub.new_connection(me, None);
    hub.register(conn.clone()).await.unwrap();
    hub.presence().subscribe(hub, conn.id, online_friend);
    settle().await;

    tokio::time::sleep(Duration::from_millis(600)).await;
    settle().await;

    let mut statuses = Vec::new();
    while let Ok(bytes) = rx.try_recv() {
        let frame: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        if frame["type"] == "user_status" {
            statuses.push(frame);
        }
    }
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0]["data"]["user_id"], online_friend.to_string());
    assert_eq!(statuses[0]["data"]["status"], "online");
    app.engine.shutdown().await;
}
