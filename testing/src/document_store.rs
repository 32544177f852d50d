//! In-memory document store for fast, deterministic tests.
//!
//! Behaves like the hosted store as far as the data layer can tell:
//! - server-timestamp sentinels are replaced with the store clock's time
//! - equality and array-contains filters
//! - `order_by` skips documents without the field and compares opaque
//!   timestamps and ISO strings by instant
//! - subscriptions deliver the full result set on open and after every write
//!   to the collection, and end when the stream is dropped
//!
//! Failure injection (`fail_next`, `set_offline`, `break_subscriptions`) and
//! call counters (`read_count`, `write_count`) support error-path tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on lock poisoning

use event_planner_core::document::{
    Direction, Document, DocumentStore, DocumentStoreError, Fields, Query, SnapshotStream,
    StoreFuture,
};
use event_planner_core::environment::{Clock, SystemClock};
use event_planner_core::timestamp;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type Snapshot = Result<Vec<Document>, DocumentStoreError>;

struct Watcher {
    collection: String,
    query: Query,
    tx: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    watchers: Vec<Watcher>,
    failures: VecDeque<DocumentStoreError>,
    offline: bool,
    reads: usize,
    writes: usize,
}

impl Inner {
    fn check(&mut self) -> Result<(), DocumentStoreError> {
        if self.offline {
            return Err(DocumentStoreError::Unavailable("store is offline".to_owned()));
        }
        self.failures.pop_front().map_or(Ok(()), Err)
    }

    fn run(&self, collection: &str, query: &Query) -> Vec<Document> {
        let mut documents: Vec<Document> = self
            .collections
            .get(collection)
            .into_iter()
            .flat_map(BTreeMap::iter)
            .filter(|(_, fields)| query.matches(fields))
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect();
        if let Some(order) = &query.order_by {
            documents.retain(|doc| doc.get(&order.field).is_some_and(|v| !v.is_null()));
            documents.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.field), b.get(&order.field));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        documents
    }

    fn notify(&mut self, collection: &str) {
        let snapshots: Vec<Option<Vec<Document>>> = self
            .watchers
            .iter()
            .map(|watcher| {
                (watcher.collection == collection).then(|| self.run(collection, &watcher.query))
            })
            .collect();
        let mut index = 0;
        self.watchers.retain(|watcher| {
            let snapshot = snapshots[index].clone();
            index += 1;
            match snapshot {
                Some(documents) => watcher.tx.send(Ok(documents)).is_ok(),
                None => !watcher.tx.is_closed(),
            }
        });
    }
}

/// Orders by instant when both sides read as timestamps, then by number,
/// then by JSON text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (Some(a), Some(b)) = (a, b) else {
        return a.is_some().cmp(&b.is_some());
    };
    if let (Ok(a), Ok(b)) = (timestamp::parse(a), timestamp::parse(b)) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => a.cmp(b),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// In-memory implementation of [`DocumentStore`].
///
/// # Example
///
/// ```
/// use event_planner_testing::InMemoryDocumentStore;
/// use event_planner_core::document::{DocumentStore, Query};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryDocumentStore::new();
/// store.seed("vendors", "v1", json!({ "name": "Lens & Light" }));
///
/// let vendors = store.query("vendors", Query::all()).await?;
/// assert_eq!(vendors.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("InMemoryDocumentStore")
            .field("collections", &inner.collections.len())
            .field("watchers", &inner.watchers.len())
            .field("offline", &inner.offline)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Empty store stamping server timestamps with the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty store stamping server timestamps with `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
        }
    }

    /// Insert a document directly, bypassing counters and failure injection.
    ///
    /// `body` must be a JSON object; anything else is stored as an empty
    /// document. Open subscriptions on the collection are notified.
    pub fn seed(&self, collection: &str, id: &str, body: Value) {
        let fields = match body {
            Value::Object(fields) => self.resolve(fields),
            _ => Fields::new(),
        };
        let mut inner = self.inner.lock().unwrap();
        inner
            .collections
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), fields);
        inner.notify(collection);
    }

    /// Raw stored body, without counters
    #[must_use]
    pub fn document(&self, collection: &str, id: &str) -> Option<Fields> {
        self.inner
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned()
    }

    /// Number of documents in `collection`
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Whether `collection` holds no documents
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Make the next `count` calls fail with `error`
    pub fn fail_next(&self, count: usize, error: &DocumentStoreError) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .failures
            .extend(std::iter::repeat_n(error.clone(), count));
    }

    /// While offline every call fails with `Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().unwrap().offline = offline;
    }

    /// Deliver `error` to every open subscription
    pub fn break_subscriptions(&self, error: &DocumentStoreError) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .watchers
            .retain(|watcher| watcher.tx.send(Err(error.clone())).is_ok());
    }

    /// Number of subscriptions whose stream is still alive
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.watchers.retain(|watcher| !watcher.tx.is_closed());
        inner.watchers.len()
    }

    /// `get`, `query` and `subscribe` calls so far (including failed ones)
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.inner.lock().unwrap().reads
    }

    /// `create`, `update` and `delete` calls so far (including failed ones)
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    fn resolve(&self, mut fields: Fields) -> Fields {
        let mut stamp = None;
        for value in fields.values_mut() {
            if timestamp::is_server_timestamp(value) {
                *value = stamp
                    .get_or_insert_with(|| timestamp::to_wire(self.clock.now()))
                    .clone();
            }
        }
        fields
    }

    fn read<T>(
        &self,
        op: impl FnOnce(&mut Inner) -> Result<T, DocumentStoreError>,
    ) -> Result<T, DocumentStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;
        inner.check()?;
        op(&mut inner)
    }

    fn write<T>(
        &self,
        op: impl FnOnce(&mut Inner) -> Result<T, DocumentStoreError>,
    ) -> Result<T, DocumentStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.writes += 1;
        inner.check()?;
        op(&mut inner)
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn create(&self, collection: &str, fields: Fields) -> StoreFuture<'_, String> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let fields = self.resolve(fields);
            self.write(|inner| {
                let id = uuid::Uuid::new_v4().simple().to_string();
                inner
                    .collections
                    .entry(collection.clone())
                    .or_default()
                    .insert(id.clone(), fields);
                inner.notify(&collection);
                Ok(id)
            })
        })
    }

    fn get(&self, collection: &str, id: &str) -> StoreFuture<'_, Option<Document>> {
        let (collection, id) = (collection.to_owned(), id.to_owned());
        Box::pin(async move {
            self.read(|inner| {
                Ok(inner
                    .collections
                    .get(&collection)
                    .and_then(|documents| documents.get(&id))
                    .map(|fields| Document::new(id.clone(), fields.clone())))
            })
        })
    }

    fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreFuture<'_, ()> {
        let (collection, id) = (collection.to_owned(), id.to_owned());
        Box::pin(async move {
            let patch = self.resolve(patch);
            self.write(|inner| {
                let document = inner
                    .collections
                    .get_mut(&collection)
                    .and_then(|documents| documents.get_mut(&id))
                    .ok_or_else(|| DocumentStoreError::NotFound {
                        collection: collection.clone(),
                        id: id.clone(),
                    })?;
                document.extend(patch);
                inner.notify(&collection);
                Ok(())
            })
        })
    }

    fn delete(&self, collection: &str, id: &str) -> StoreFuture<'_, ()> {
        let (collection, id) = (collection.to_owned(), id.to_owned());
        Box::pin(async move {
            self.write(|inner| {
                let removed = inner
                    .collections
                    .get_mut(&collection)
                    .and_then(|documents| documents.remove(&id));
                if removed.is_some() {
                    inner.notify(&collection);
                }
                Ok(())
            })
        })
    }

    fn query(&self, collection: &str, query: Query) -> StoreFuture<'_, Vec<Document>> {
        let collection = collection.to_owned();
        Box::pin(async move { self.read(|inner| Ok(inner.run(&collection, &query))) })
    }

    fn subscribe(&self, collection: &str, query: Query) -> StoreFuture<'_, SnapshotStream> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let rx = self.read(|inner| {
                let (tx, rx) = mpsc::unbounded_channel();
                let _ = tx.send(Ok(inner.run(&collection, &query)));
                inner.watchers.push(Watcher {
                    collection: collection.clone(),
                    query,
                    tx,
                });
                Ok(rx)
            })?;

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(snapshot) = rx.recv().await {
                    yield snapshot;
                }
            };

            Ok(Box::pin(stream) as SnapshotStream)
        })
    }
}
