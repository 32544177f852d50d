//! Session lifecycle: loading, re-scoping on identity changes and release of
//! the chat subscription.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{Harness, birthday, config, released, within};
use event_planner_core::document::{DocumentStoreError, collections};
use event_planner_core::identity::Identity;
use event_planner_core::ids::UserId;
use event_planner_runtime::catalog::FALLBACK_VENDOR_COUNT;
use event_planner_runtime::{Session, StoreError};
use serde_json::json;

fn session(h: &Harness) -> Session {
    Session::new(h.env.clone(), config())
}

fn seed_fixtures(h: &Harness) {
    h.documents.seed(
        collections::EVENTS,
        "e1",
        json!({
            "title": "Alice's Wedding",
            "date": "2025-09-20T00:00:00.000Z",
            "createdBy": "alice",
            "createdAt": "2025-01-01T00:00:00Z",
        }),
    );
    h.documents.seed(
        collections::CHAT_ROOMS,
        "r1",
        json!({
            "participants": ["alice", "v1"],
            "lastMessage": "See you there",
            "lastMessageAt": "2025-01-02T00:00:00Z",
            "createdAt": "2025-01-01T00:00:00Z",
        }),
    );
}

#[tokio::test]
async fn init_loads_every_store_and_subscribes() {
    let h = Harness::signed_in(Identity::customer("alice"));
    seed_fixtures(&h);
    let session = session(&h);

    session.init().await.unwrap();

    assert_eq!(session.events().items().len(), 1);
    assert_eq!(session.vendors().items().len(), FALLBACK_VENDOR_COUNT);
    assert!(session.bookings().items().is_empty());
    assert_eq!(session.subscribed_user().await, Some(UserId::new("alice")));

    let mut rooms = session.chat().watch();
    within(rooms.wait_for(|s| s.items.len() == 1)).await.unwrap();
}

#[tokio::test]
async fn init_while_signed_out_opens_nothing() {
    let h = Harness::signed_out();
    seed_fixtures(&h);
    let session = session(&h);

    session.init().await.unwrap();

    assert!(session.events().items().is_empty());
    assert_eq!(session.vendors().items().len(), FALLBACK_VENDOR_COUNT);
    assert!(session.chat().rooms().is_empty());
    assert_eq!(session.subscribed_user().await, None);
    assert_eq!(h.documents.subscriber_count(), 0);
}

#[tokio::test]
async fn init_reports_a_failure_but_loads_the_rest() {
    let h = Harness::signed_in(Identity::customer("alice"));
    seed_fixtures(&h);
    let session = session(&h);

    h.documents
        .fail_next(1, &DocumentStoreError::PermissionDenied("rules".into()));
    let err = session.init().await.unwrap_err();

    assert!(matches!(err, StoreError::RemoteFailure(_)));
    assert_eq!(session.vendors().items().len(), FALLBACK_VENDOR_COUNT);
    assert_eq!(session.subscribed_user().await, Some(UserId::new("alice")));
}

#[tokio::test]
async fn identity_change_moves_the_subscription() {
    let h = Harness::signed_in(Identity::customer("alice"));
    seed_fixtures(&h);
    let session = session(&h);
    session.init().await.unwrap();
    session.events().add(birthday("Alice's Party")).await.unwrap();
    assert_eq!(session.events().items().len(), 2);

    h.as_user(Identity::vendor("v1"));
    session.identity_changed().await.unwrap();

    assert_eq!(session.subscribed_user().await, Some(UserId::new("v1")));
    assert!(session.events().items().is_empty(), "alice's events are gone");
    let mut rooms = session.chat().watch();
    within(rooms.wait_for(|s| {
        s.items.len() == 1 && s.items.iter().all(|r| r.includes(&UserId::new("v1")))
    }))
    .await
    .unwrap();
}

#[tokio::test]
async fn signing_out_clears_identity_scoped_state() {
    let h = Harness::signed_in(Identity::customer("alice"));
    seed_fixtures(&h);
    let session = session(&h);
    session.init().await.unwrap();
    let mut rooms = session.chat().watch();
    within(rooms.wait_for(|s| s.items.len() == 1)).await.unwrap();

    h.identity.sign_out();
    session.identity_changed().await.unwrap();

    assert_eq!(session.subscribed_user().await, None);
    assert!(session.events().items().is_empty());
    assert!(session.bookings().items().is_empty());
    assert!(session.chat().rooms().is_empty());
    assert_eq!(
        session.vendors().items().len(),
        FALLBACK_VENDOR_COUNT,
        "the catalog is not identity-scoped"
    );
    released(&h.documents).await;
}

#[tokio::test]
async fn dispose_is_idempotent() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let session = session(&h);
    session.init().await.unwrap();

    session.dispose().await;
    session.dispose().await;

    assert_eq!(session.subscribed_user().await, None);
    released(&h.documents).await;
}

#[tokio::test]
async fn dropping_the_session_releases_the_subscription() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let session = session(&h);
    session.init().await.unwrap();
    assert_eq!(h.documents.subscriber_count(), 1);

    drop(session);

    released(&h.documents).await;
}

#[tokio::test]
async fn session_notices_reach_subscribers() {
    let h = Harness::signed_in(Identity::customer("alice"));
    let session = session(&h);
    let mut notices = session.notices();

    session.events().add(birthday("x")).await.unwrap();

    let notice = within(notices.recv()).await.unwrap();
    assert_eq!(notice.description, "Event created successfully");
}
