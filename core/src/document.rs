//! Document store capability.
//!
//! The remote store is treated as a capability, not a protocol: named
//! collections of untyped key/value documents with create/get/update/delete,
//! filtered and ordered queries, and live subscriptions that re-deliver a
//! query's full result set on every change.
//!
//! # Implementations
//!
//! - `InMemoryDocumentStore` (in `event-planner-testing`): fast, deterministic,
//!   with live subscriptions and failure injection
//! - A hosted document database adapter lives with the application shell
//!
//! # Example
//!
//! ```no_run
//! use event_planner_core::document::{collections, DocumentStore, DocumentStoreError, Filter, Query};
//!
//! async fn mine<S: DocumentStore>(store: &S, uid: &str) -> Result<usize, DocumentStoreError> {
//!     let docs = store
//!         .query(collections::EVENTS, Query::all().filter(Filter::eq("createdBy", uid)))
//!         .await?;
//!     Ok(docs.len())
//! }
//! ```

use futures::Stream;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Untyped document body as it crosses the wire.
pub type Fields = Map<String, Value>;

/// Collection names. One document per entity.
pub mod collections {
    /// Customer events
    pub const EVENTS: &str = "events";
    /// Vendor catalog
    pub const VENDORS: &str = "vendors";
    /// Quotation requests sent to vendors
    pub const QUOTATIONS: &str = "quotations";
    /// Customer/vendor bookings
    pub const BOOKINGS: &str = "bookings";
    /// Two-party chat rooms
    pub const CHAT_ROOMS: &str = "chatRooms";
    /// Chat messages
    pub const MESSAGES: &str = "messages";
}

/// A stored document: its id plus its untyped fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Store-assigned id
    pub id: String,
    /// Document body
    pub fields: Fields,
}

impl Document {
    /// Creates a document
    #[must_use]
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Read a top-level field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// A single query predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq {
        /// Field name
        field: String,
        /// Expected value
        value: Value,
    },
    /// `field` is an array containing `value`
    ArrayContains {
        /// Field name
        field: String,
        /// Element that must be present
        value: Value,
    },
}

impl Filter {
    /// Equality predicate
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Array-membership predicate
    #[must_use]
    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluate the predicate against a document body
    #[must_use]
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Self::Eq { field, value } => fields.get(field) == Some(value),
            Self::ArrayContains { field, value } => fields
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Oldest / smallest first
    Ascending,
    /// Newest / largest first
    Descending,
}

/// Sort key for a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    /// Field to sort on
    pub field: String,
    /// Sort direction
    pub direction: Direction,
}

/// A filtered, optionally ordered query over one collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Predicates, all of which must hold
    pub filters: Vec<Filter>,
    /// Optional sort key
    pub order_by: Option<OrderBy>,
}

impl Query {
    /// Every document in the collection
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a predicate
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the sort key
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Whether a document body satisfies every predicate
    #[must_use]
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|filter| filter.matches(fields))
    }
}

/// Errors that can occur during document store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentStoreError {
    /// The store could not be reached (network, outage). Transient.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// Security rules rejected the call
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The addressed document does not exist
    #[error("document {collection}/{id} not found")]
    NotFound {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
    },

    /// The query cannot be served (e.g. missing index)
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A document body could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Quota, internal errors and anything else
    #[error("document store error: {0}")]
    Other(String),
}

impl DocumentStoreError {
    /// Whether retrying the same idempotent read may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Live result sets of a subscribed query.
///
/// Each item is the complete, consistent result set at one point in the
/// store's change order (never a delta). Dropping the stream releases the
/// subscription.
pub type SnapshotStream =
    Pin<Box<dyn Stream<Item = Result<Vec<Document>, DocumentStoreError>> + Send>>;

/// Boxed future returned by [`DocumentStore`] methods.
pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, DocumentStoreError>> + Send + 'a>>;

/// Document store abstraction used by every store in the runtime.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one instance is shared by all stores
/// of a session.
///
/// # Server Timestamps
///
/// A field whose value is [`crate::timestamp::server_timestamp`] must be
/// replaced by the store's commit time (in the opaque
/// [`crate::timestamp::to_wire`] shape) on `create` and `update`.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be used as `Arc<dyn DocumentStore>`. Returned futures borrow only
/// `self`; implementations copy the string arguments they need.
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id.
    ///
    /// # Errors
    ///
    /// Any [`DocumentStoreError`] the backend reports.
    fn create(&self, collection: &str, fields: Fields) -> StoreFuture<'_, String>;

    /// Fetch one document; `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Any [`DocumentStoreError`] the backend reports.
    fn get(&self, collection: &str, id: &str) -> StoreFuture<'_, Option<Document>>;

    /// Merge `patch` into an existing document.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::NotFound`] when the document does not exist.
    fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreFuture<'_, ()>;

    /// Delete a document. Deleting a missing document is not an error.
    ///
    /// # Errors
    ///
    /// Any [`DocumentStoreError`] the backend reports.
    fn delete(&self, collection: &str, id: &str) -> StoreFuture<'_, ()>;

    /// Run a one-shot query.
    ///
    /// # Errors
    ///
    /// Any [`DocumentStoreError`] the backend reports.
    fn query(&self, collection: &str, query: Query) -> StoreFuture<'_, Vec<Document>>;

    /// Open a live query. The first item is the current result set.
    ///
    /// # Errors
    ///
    /// Fails if the subscription cannot be established; later failures arrive
    /// as `Err` items on the stream.
    fn subscribe(&self, collection: &str, query: Query) -> StoreFuture<'_, SnapshotStream>;
}
