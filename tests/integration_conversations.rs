#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, unreachable_pub, clippy::similar_names)]
use axum::http::StatusCode;
use serde_json::Value;
mod common;

#[tokio::test]
async fn test_read_receipts_flow() {
    let app = common::TestApp::spawn().await;
    app.store.connect("alice", "bob");

    let hello = app.send("alice", "bob", "hello").await;
    let conversation_id = hello["conversationId"].as_str().unwrap().to_string();
    assert_eq!(app.unread_count("bob").await, 1);

    let resp = app.client.get(app.url("/messages/conversations/alice")).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["conversations"][0]["lastMessage"]["content"], "hello");

    app.send("bob", "alice", "hi back").await;
    assert_eq!(app.unread_count("alice").await, 1);
    assert_eq!(app.unread_count("bob").await, 1);

    let resp = app.client.get(app.url("/messages/conversations/alice")).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["conversations"][0]["lastMessage"]["content"], "hi back");
    assert_eq!(body["conversations"][0]["lastMessage"]["senderId"], "bob");

    let resp = app.mark_read(&conversation_id, "alice").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Messages marked as read");
    assert_eq!(body["markedCount"], 1);

    assert_eq!(app.unread_count("alice").await, 0);
    assert_eq!(app.unread_count("bob").await, 1);

    let resp = app.mark_read(&conversation_id, "alice").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["markedCount"], 0);

    let resp = app.messages(&conversation_id, "bob").await;
    let body: Value = resp.json().await.unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[0]["isRead"], false);
    assert_eq!(messages[1]["isRead"], true);
    assert!(messages[1]["readAt"].is_string());
}

#[tokio::test]
async fn test_conversation_listing_order_and_profiles() {
    let app = common::TestApp::spawn().await;
    app.store.connect("alice", "bob");
    app.store.connect("alice", "carol");
    app.profile("bob", "Bob Brown", Some("avatars/bob.jpg"));

    app.send("alice", "bob", "first").await;
    app.send("carol", "alice", "second").await;

    let resp = app.client.get(app.url("/messages/conversations/alice")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();

    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0]["lastMessage"]["content"], "second");
    assert_eq!(conversations[0]["participants"][0]["userId"], "carol");
    assert_eq!(conversations[0]["participants"][0]["fullName"], "Unknown User");
    assert_eq!(conversations[0]["unreadCount"], 1);
    assert_eq!(conversations[0]["conversationType"], "direct");
    assert_eq!(conversations[1]["participants"][0]["fullName"], "Bob Brown");
    assert_eq!(
        conversations[1]["participants"][0]["profileImage"],
        format!("{}/avatars/bob.jpg", common::MEDIA_BASE_URL)
    );
    assert_eq!(conversations[1]["participants"].as_array().unwrap().len(), 1);
    assert_eq!(conversations[1]["unreadCount"], 0);

    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 20);
    assert_eq!(body["pagination"]["total"], 2);
}

#[tokio::test]
async fn test_conversation_pagination() {
    let app = common::TestApp::spawn().await;
    for peer in ["bob", "carol", "dave"] {
        app.store.connect("alice", peer);
        app.send(peer, "alice", "ping").await;
    }

    let resp = app.client.get(app.url("/messages/conversations/alice?page=2&limit=2")).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();

    assert_eq!(body["conversations"].as_array().unwrap().len(), 1);
    assert_eq!(body["conversations"][0]["participants"][0]["userId"], "bob");
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["limit"], 2);
    assert_eq!(body["pagination"]["total"], 3);

    let resp = app.client.get(app.url("/messages/conversations/alice?limit=1000")).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pagination"]["limit"], 100);
}

#[tokio::test]
async fn test_malformed_paging_uses_defaults() {
    let app = common::TestApp::spawn().await;
    app.store.connect("alice", "bob");
    let sent = app.send("alice", "bob", "ping").await;
    let conversation_id = sent["conversationId"].as_str().unwrap();

    let resp = app.client.get(app.url("/messages/conversations/alice?page=abc&limit=-1")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 20);
    assert_eq!(body["conversations"].as_array().unwrap().len(), 1);

    let resp = app
        .client
        .get(app.url(&format!("/messages/conversation/{conversation_id}?userId=bob&page=-2&limit=lots")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 50);
    assert_eq!(body["messages"][0]["content"], "ping");
}

#[tokio::test]
async fn test_messages_are_paginated_newest_page_oldest_first() {
    let app = common::TestApp::spawn().await;
    app.store.connect("alice", "bob");

    let mut conversation_id = String::new();
    for i in 0..5 {
        let sent = app.send("alice", "bob", &format!("m{i}")).await;
        conversation_id = sent["conversationId"].as_str().unwrap().to_string();
    }

    let resp = app
        .client
        .get(app.url(&format!("/messages/conversation/{conversation_id}?userId=bob&page=1&limit=2")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();

    let contents: Vec<&str> = body["messages"].as_array().unwrap().iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(contents, vec!["m3", "m4"]);
    assert_eq!(body["pagination"]["total"], 5);
    assert_eq!(body["pagination"]["limit"], 2);

    let resp = app.messages(&conversation_id, "alice").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["messages"].as_array().unwrap().len(), 5);
    assert_eq!(body["messages"][0]["content"], "m0");
    assert_eq!(body["pagination"]["limit"], 50);
}

#[tokio::test]
async fn test_conversation_access_is_limited_to_participants() {
    let app = common::TestApp::spawn().await;
    app.store.connect("alice", "bob");
    let sent = app.send("alice", "bob", "secret").await;
    let conversation_id = sent["conversationId"].as_str().unwrap();

    let resp = app.messages(conversation_id, "mallory").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Access denied to this conversation");

    let resp = app.mark_read(conversation_id, "mallory").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let missing = uuid::Uuid::now_v7().to_string();
    assert_eq!(app.messages(&missing, "alice").await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.mark_read(&missing, "alice").await.status(), StatusCode::FORBIDDEN);

    assert_eq!(app.messages("not-a-uuid", "alice").await.status(), StatusCode::BAD_REQUEST);

    let resp = app.client.get(app.url(&format!("/messages/conversation/{conversation_id}"))).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
