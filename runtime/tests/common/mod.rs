//! Shared fixtures for the store integration tests.

#![allow(dead_code)] // Each test binary uses a different subset
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use event_planner_core::document::{
    Document, DocumentStore, Fields, Filter, Query, SnapshotStream, StoreFuture,
};
use event_planner_core::environment::Clock;
use event_planner_core::identity::Identity;
use event_planner_core::model::NewEvent;
use event_planner_runtime::{
    BookingStore, ChatStore, Environment, EventStore, Notice, Notifier, StoreConfig, VendorStore,
};
use event_planner_testing::{InMemoryDocumentStore, MutableIdentity, SteppingClock};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast};

/// A document store, an identity and a clock, wired into one environment.
pub struct Harness {
    pub documents: Arc<InMemoryDocumentStore>,
    pub identity: Arc<MutableIdentity>,
    pub env: Environment,
    pub notifier: Notifier,
}

impl Harness {
    pub fn signed_in(identity: Identity) -> Self {
        Self::with_identity(MutableIdentity::signed_in(identity))
    }

    pub fn signed_out() -> Self {
        Self::with_identity(MutableIdentity::signed_out())
    }

    fn with_identity(identity: MutableIdentity) -> Self {
        Self::with_clock(identity, Arc::new(SteppingClock::default()))
    }

    /// Drive both the document store and the environment from `clock`.
    pub fn with_clock(identity: MutableIdentity, clock: Arc<dyn Clock>) -> Self {
        event_planner_testing::init_test_tracing();
        let documents = Arc::new(InMemoryDocumentStore::with_clock(Arc::clone(&clock)));
        let identity = Arc::new(identity);
        let env = Environment::new(documents.clone(), identity.clone(), clock);
        Self {
            documents,
            identity,
            env,
            notifier: Notifier::new(32),
        }
    }

    pub fn events(&self) -> EventStore {
        EventStore::new(self.env.clone(), &config(), self.notifier.clone())
    }

    pub fn vendors(&self) -> VendorStore {
        VendorStore::new(self.env.clone(), &config(), self.notifier.clone())
    }

    pub fn bookings(&self) -> BookingStore {
        BookingStore::new(self.env.clone(), &config(), self.notifier.clone())
    }

    pub fn chat(&self) -> ChatStore {
        ChatStore::new(self.env.clone(), &config(), self.notifier.clone())
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    pub fn as_user(&self, identity: Identity) {
        self.identity.sign_in(identity);
    }

    /// Same identity and clock, but queries carrying `filter` wait for the
    /// returned gate to open.
    pub fn gated(&self, filter: Filter) -> (Environment, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let documents = GatedQueries {
            inner: Arc::clone(&self.documents),
            filter,
            gate: Arc::clone(&gate),
        };
        let env = Environment::new(
            Arc::new(documents),
            self.identity.clone(),
            Arc::clone(&self.env.clock),
        );
        (env, gate)
    }
}

/// Holds back matching queries until the gate is notified. Everything else
/// goes straight to the in-memory store.
struct GatedQueries {
    inner: Arc<InMemoryDocumentStore>,
    filter: Filter,
    gate: Arc<Notify>,
}

impl DocumentStore for GatedQueries {
    fn create(&self, collection: &str, fields: Fields) -> StoreFuture<'_, String> {
        self.inner.create(collection, fields)
    }

    fn get(&self, collection: &str, id: &str) -> StoreFuture<'_, Option<Document>> {
        self.inner.get(collection, id)
    }

    fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreFuture<'_, ()> {
        self.inner.update(collection, id, patch)
    }

    fn delete(&self, collection: &str, id: &str) -> StoreFuture<'_, ()> {
        self.inner.delete(collection, id)
    }

    fn query(&self, collection: &str, query: Query) -> StoreFuture<'_, Vec<Document>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if query.filters.contains(&self.filter) {
                self.gate.notified().await;
            }
            self.inner.query(&collection, query).await
        })
    }

    fn subscribe(&self, collection: &str, query: Query) -> StoreFuture<'_, SnapshotStream> {
        self.inner.subscribe(collection, query)
    }
}

/// Default config with millisecond retry delays.
pub fn config() -> StoreConfig {
    StoreConfig::default().with_read_retry_delays(1, 2)
}

pub fn birthday(title: &str) -> NewEvent {
    NewEvent {
        title: title.to_owned(),
        date: "2025-06-01".to_owned(),
        location: "Pune".to_owned(),
        event_type: "birthday".to_owned(),
        guests: 10,
        budget: Some(1000.0),
        ..NewEvent::default()
    }
}

/// Every notice received so far, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}

/// Fail the test if `fut` takes longer than a second.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(1), fut)
        .await
        .expect("timed out")
}

/// Wait until every subscription on `documents` has been dropped.
pub async fn released(documents: &InMemoryDocumentStore) {
    within(async {
        while documents.subscriber_count() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await;
}
