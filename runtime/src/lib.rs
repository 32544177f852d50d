//! # Event Planner Runtime
//!
//! Role-scoped stores for the event planner's data layer.
//!
//! Each store owns one cached collection, scopes every query by the caller's
//! identity, and talks to the remote document store through the
//! [`event_planner_core::document::DocumentStore`] capability.
//!
//! ## Core Components
//!
//! - **[`EventStore`]**: the caller's events (all events for admins)
//! - **[`VendorStore`]**: the vendor catalog, with a built-in fallback, and
//!   quotation requests
//! - **[`BookingStore`]**: bookings and their status state machine
//! - **[`ChatStore`]**: live chat rooms and messages
//! - **[`Session`]**: owns one of each, wires them to an [`Environment`] and
//!   manages the chat subscription lifecycle
//!
//! ## Example
//!
//! ```ignore
//! use event_planner_runtime::{Environment, Session, config::StoreConfig};
//!
//! let session = Session::new(
//!     Environment::new(documents, identity, Arc::new(SystemClock)),
//!     StoreConfig::from_env(),
//! );
//! session.init().await;
//!
//! let mine = session.events().items();
//! ```

use event_planner_core::document::{Document, DocumentStore};
use event_planner_core::environment::Clock;
use event_planner_core::identity::{Identity, IdentityProvider};
use event_planner_core::model::{CoercionError, Entity};
use event_planner_core::timestamp;
use std::sync::Arc;

/// Booking store
pub mod bookings;

/// Bundled vendor catalog
pub mod catalog;

/// Chat store and room subscriptions
pub mod chat;

/// Store configuration
pub mod config;

/// Event store
pub mod events;

/// Metrics for remote calls and data quality
pub mod metrics;

/// User-facing notices
pub mod notice;

/// Retry logic with exponential backoff
pub mod retry;

/// Session context owning all stores
pub mod session;

/// Reactive collection state
pub mod state;

/// Vendor store
pub mod vendors;

/// Error types for the stores
pub mod error {
    use event_planner_core::document::DocumentStoreError;
    use event_planner_core::model::{BookingStatus, InvalidInput, InvalidTransition};
    use thiserror::Error;

    /// Errors returned by store operations.
    ///
    /// Every variant renders a human-readable message; stores record that
    /// message in their `error` field before returning the error.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// The operation needs a signed-in identity
        #[error("You must be logged in to do that")]
        Unauthenticated,

        /// The addressed record does not exist
        #[error("{entity} {id} not found")]
        NotFound {
            /// Entity name
            entity: &'static str,
            /// Record id
            id: String,
        },

        /// The document store rejected the call
        #[error("Remote store call failed: {0}")]
        RemoteFailure(DocumentStoreError),

        /// Input rejected before any remote call
        #[error("Invalid input: {0}")]
        ValidationFailure(String),

        /// The booking state machine does not allow this change
        #[error("Cannot move booking from {from} to {to}")]
        InvalidTransition {
            /// Current status
            from: BookingStatus,
            /// Requested status
            to: BookingStatus,
        },
    }

    impl StoreError {
        /// Map a remote failure on `entity`/`id`, turning the store's
        /// `NotFound` into ours.
        #[must_use]
        pub fn remote(entity: &'static str, id: &str, err: DocumentStoreError) -> Self {
            match err {
                DocumentStoreError::NotFound { .. } => Self::NotFound {
                    entity,
                    id: id.to_owned(),
                },
                other => Self::RemoteFailure(other),
            }
        }
    }

    impl From<DocumentStoreError> for StoreError {
        fn from(err: DocumentStoreError) -> Self {
            Self::RemoteFailure(err)
        }
    }

    impl From<InvalidInput> for StoreError {
        fn from(err: InvalidInput) -> Self {
            Self::ValidationFailure(err.0)
        }
    }

    impl From<InvalidTransition> for StoreError {
        fn from(err: InvalidTransition) -> Self {
            Self::InvalidTransition {
                from: err.from,
                to: err.to,
            }
        }
    }
}

/// Injected dependencies shared by every store of a session.
#[derive(Clone)]
pub struct Environment {
    /// Remote document store
    pub documents: Arc<dyn DocumentStore>,
    /// Source of the caller's identity
    pub identity: Arc<dyn IdentityProvider>,
    /// Time source for client-side stamps
    pub clock: Arc<dyn Clock>,
}

impl Environment {
    /// Bundle the three seams
    #[must_use]
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            documents,
            identity,
            clock,
        }
    }

    /// The signed-in identity, if any
    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.identity.current_identity()
    }

    /// The signed-in identity.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unauthenticated`] when nobody is signed in.
    pub fn require_identity(&self) -> Result<Identity, StoreError> {
        self.current_identity().ok_or(StoreError::Unauthenticated)
    }

    /// Current time in canonical ISO form
    #[must_use]
    pub fn now_iso(&self) -> String {
        timestamp::to_iso(self.clock.now())
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("identity", &self.current_identity())
            .finish_non_exhaustive()
    }
}

/// Coerce every document, dropping (and counting) the ones that fail.
pub(crate) fn coerce_all<T>(
    collection: &'static str,
    documents: &[Document],
    coerce: impl Fn(&Document) -> Result<T, CoercionError>,
) -> Vec<T> {
    documents
        .iter()
        .filter_map(|document| match coerce(document) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::warn!(collection, error = %err, "Dropping malformed record");
                crate::metrics::record_dropped(collection);
                None
            }
        })
        .collect()
}

/// Record a failed mutation: keep the cached items, store the message,
/// publish an error notice.
pub(crate) fn record_failure<T: Entity>(
    state: &StateHandle<T>,
    notifier: &Notifier,
    err: StoreError,
    description: &str,
) -> StoreError {
    tracing::error!(error = %err, "{description}");
    state.send(CollectionAction::Failed(err.to_string()));
    notifier.publish(Notice::error("Error", description));
    err
}

pub use bookings::BookingStore;
pub use chat::{ChatStore, RoomSubscription};
pub use config::StoreConfig;
pub use error::StoreError;
pub use events::EventStore;
pub use notice::{Notice, NoticeLevel, Notifier};
pub use session::Session;
pub use state::{CollectionAction, CollectionReducer, CollectionState, StateHandle};
pub use vendors::{CatalogSource, VendorStore};
