//! Integration tests for the chat store and its room subscription.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{Harness, drain, released, within};
use event_planner_core::document::{DocumentStoreError, collections};
use event_planner_core::identity::Identity;
use event_planner_core::ids::{MessageId, RoomId, UserId};
use event_planner_runtime::StoreError;
use serde_json::json;

fn seed_room(h: &Harness, id: &str, a: &str, b: &str, last_at: &str) {
    h.documents.seed(
        collections::CHAT_ROOMS,
        id,
        json!({
            "participants": [a, b],
            "lastMessage": "",
            "lastMessageAt": last_at,
            "createdAt": "2025-01-01T00:00:00Z",
        }),
    );
}

fn user(id: &str) -> UserId {
    UserId::new(id)
}

#[tokio::test]
async fn subscription_delivers_only_the_users_rooms() {
    let h = Harness::signed_in(Identity::customer("alice"));
    seed_room(&h, "r1", "alice", "bob", "2025-01-02T00:00:00Z");
    seed_room(&h, "r2", "carol", "bob", "2025-01-03T00:00:00Z");
    seed_room(&h, "r3", "dave", "alice", "2025-01-04T00:00:00Z");
    let chat = h.chat();
    let mut rooms = chat.watch();

    let _subscription = chat.subscribe(&user("alice")).await.unwrap();
    within(rooms.wait_for(|s| s.items.len() == 2)).await.unwrap();

    let ids: Vec<_> = chat.rooms().into_iter().map(|r| r.id.into_inner()).collect();
    assert_eq!(ids, ["r3", "r1"], "most recently active first");
    assert!(chat.rooms().iter().all(|r| r.includes(&user("alice"))));
    assert!(!chat.state().loading);
}

#[tokio::test]
async fn new_rooms_arrive_through_the_subscription() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let chat = h.chat();
    let mut rooms = chat.watch();
    let _subscription = chat.subscribe(&user("alice")).await.unwrap();

    let id = chat.create_room(vec![user("alice"), user("bob")]).await.unwrap();
    within(rooms.wait_for(|s| s.items.len() == 1)).await.unwrap();

    let room = chat.get(&id).unwrap();
    assert_eq!(room.last_message, "");
    assert_eq!(room.last_message_at, room.created_at);
}

#[tokio::test]
async fn create_room_requires_the_caller_as_participant() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let chat = h.chat();
    let mut notices = h.notices();

    let outsider = chat.create_room(vec![user("bob"), user("carol")]).await;
    let alone = chat.create_room(vec![user("alice"), user("alice")]).await;

    assert!(matches!(outsider, Err(StoreError::ValidationFailure(_))));
    assert!(matches!(alone, Err(StoreError::ValidationFailure(_))));
    assert_eq!(h.documents.write_count(), 0);
    assert!(
        drain(&mut notices)
            .iter()
            .all(|n| n.description == "Failed to create chat room. Please try again.")
    );
}

#[tokio::test]
async fn sending_a_message_updates_the_room() {
    let h = Harness::signed_in(Identity::customer("alice"));
    seed_room(&h, "r1", "alice", "bob", "2025-01-01T00:00:00Z");
    let chat = h.chat();
    let mut rooms = chat.watch();
    let _subscription = chat.subscribe(&user("alice")).await.unwrap();
    within(rooms.wait_for(|s| s.items.len() == 1)).await.unwrap();

    let message_id = chat
        .send_message(&RoomId::new("r1"), "Hello Bob", &user("alice"))
        .await
        .unwrap();
    within(rooms.wait_for(|s| {
        s.items.first().is_some_and(|room| room.last_message == "Hello Bob")
    }))
    .await
    .unwrap();

    let message = h
        .documents
        .document(collections::MESSAGES, message_id.as_str())
        .unwrap();
    assert_eq!(message["read"], json!(false));
    assert_eq!(message["roomId"], json!("r1"));
    assert!(message["createdAt"].get("seconds").is_some());

    assert_eq!(h.documents.len(collections::CHAT_ROOMS), 1, "room updated, not duplicated");
    let room = h.documents.document(collections::CHAT_ROOMS, "r1").unwrap();
    assert_eq!(room["lastMessage"], json!("Hello Bob"));
    assert_eq!(room["participants"], json!(["alice", "bob"]));
}

#[tokio::test]
async fn unknown_room_still_gets_the_message() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let chat = h.chat();

    chat.send_message(&RoomId::new("not-cached"), "hi", &user("alice"))
        .await
        .unwrap();

    assert_eq!(h.documents.len(collections::MESSAGES), 1);
    assert!(h.documents.is_empty(collections::CHAT_ROOMS));
    assert_eq!(h.documents.write_count(), 1);
}

#[tokio::test]
async fn messages_are_sent_as_the_caller_only() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let chat = h.chat();
    let mut notices = h.notices();

    let spoofed = chat
        .send_message(&RoomId::new("r1"), "hi", &user("bob"))
        .await
        .unwrap_err();
    let blank = chat
        .send_message(&RoomId::new("r1"), "  ", &user("alice"))
        .await
        .unwrap_err();

    assert!(matches!(spoofed, StoreError::ValidationFailure(_)));
    assert!(matches!(blank, StoreError::ValidationFailure(_)));
    assert_eq!(h.documents.write_count(), 0);
    assert_eq!(
        drain(&mut notices)[0].description,
        "Failed to send message. Please try again."
    );
}

#[tokio::test]
async fn signed_out_users_cannot_chat() {
    let h = Harness::signed_out();
    let chat = h.chat();

    let err = chat
        .send_message(&RoomId::new("r1"), "hi", &user("alice"))
        .await
        .unwrap_err();

    assert_eq!(err, StoreError::Unauthenticated);
    assert_eq!(
        chat.get_room_with(&user("bob")).await.unwrap_err(),
        StoreError::Unauthenticated
    );
}

#[tokio::test]
async fn room_lookup_matches_both_participants() {
    let h = Harness::signed_in(Identity::customer("alice"));
    seed_room(&h, "r1", "alice", "bob", "2025-01-01T00:00:00Z");
    seed_room(&h, "r2", "carol", "bob", "2025-01-01T00:00:00Z");
    let chat = h.chat();

    let with_bob = chat.get_room_with(&user("bob")).await.unwrap().unwrap();
    assert_eq!(with_bob.id.as_str(), "r1");
    assert!(chat.get_room_with(&user("carol")).await.unwrap().is_none());
}

#[tokio::test]
async fn messages_come_back_oldest_first() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let chat = h.chat();
    let room = RoomId::new("r1");
    for text in ["one", "two", "three"] {
        chat.send_message(&room, text, &user("alice")).await.unwrap();
    }
    chat.send_message(&RoomId::new("r2"), "elsewhere", &user("alice"))
        .await
        .unwrap();

    let messages = chat.get_messages(&room).await.unwrap();

    let texts: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(texts, ["one", "two", "three"]);
    assert!(messages.iter().all(|m| !m.read));
}

#[tokio::test]
async fn messages_can_be_marked_read() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let chat = h.chat();
    let room = RoomId::new("r1");
    let id = chat.send_message(&room, "hi", &user("alice")).await.unwrap();

    chat.mark_read(&id).await.unwrap();

    assert!(chat.get_messages(&room).await.unwrap()[0].read);
    assert!(matches!(
        chat.mark_read(&MessageId::new("missing")).await,
        Err(StoreError::NotFound { entity: "message", .. })
    ));
}

#[tokio::test]
async fn unsubscribe_releases_the_subscription() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let chat = h.chat();

    let subscription = chat.subscribe(&user("alice")).await.unwrap();
    assert!(subscription.is_active());
    assert_eq!(subscription.user(), &user("alice"));
    assert_eq!(h.documents.subscriber_count(), 1);

    subscription.unsubscribe();
    released(&h.documents).await;
}

#[tokio::test]
async fn dropping_the_guard_closes_the_subscription() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let chat = h.chat();

    {
        let _subscription = chat.subscribe(&user("alice")).await.unwrap();
        assert_eq!(h.documents.subscriber_count(), 1);
    }

    released(&h.documents).await;
}

#[tokio::test]
async fn subscription_errors_keep_the_last_rooms() {
    let h = Harness::signed_in(Identity::customer("alice"));
    seed_room(&h, "r1", "alice", "bob", "2025-01-01T00:00:00Z");
    let chat = h.chat();
    let mut rooms = chat.watch();
    let _subscription = chat.subscribe(&user("alice")).await.unwrap();
    within(rooms.wait_for(|s| s.items.len() == 1)).await.unwrap();
    let mut notices = h.notices();

    h.documents
        .break_subscriptions(&DocumentStoreError::Unavailable("socket closed".into()));
    within(rooms.wait_for(|s| s.error.is_some())).await.unwrap();

    assert_eq!(chat.rooms().len(), 1);
    assert_eq!(
        drain(&mut notices)[0].description,
        "Failed to fetch chat rooms. Please try again later."
    );
}

#[tokio::test]
async fn failing_to_open_the_subscription_is_reported() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let chat = h.chat();

    h.documents
        .fail_next(1, &DocumentStoreError::PermissionDenied("rules".into()));
    let err = chat.subscribe(&user("alice")).await.unwrap_err();

    assert!(matches!(err, StoreError::RemoteFailure(_)));
    assert!(chat.state().error.is_some());
    assert_eq!(h.documents.subscriber_count(), 0);
}
