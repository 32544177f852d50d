//! # Event Planner Core
//!
//! Domain types and dependency seams for the event planner's data layer.
//!
//! This crate holds everything the stores in `event-planner-runtime` are built
//! on, with no I/O of its own:
//!
//! - **Identity**: [`identity::Identity`] (`user id` + [`identity::Role`]) and the
//!   [`identity::IdentityProvider`] seam
//! - **Documents**: the [`document::DocumentStore`] capability (CRUD, filtered and
//!   ordered queries, live snapshot subscriptions) and its query types
//! - **Timestamps**: normalization of opaque server timestamps and ISO strings
//!   into one canonical ISO form
//! - **Models**: typed entities (events, vendors, quotations, bookings, chat) and
//!   one fail-closed coercion function per entity
//! - **Reducer**: the pure state-transition trait the stores' caches are driven by
//!
//! ## Architecture Principles
//!
//! - Functional core, imperative shell: cached collections only change through a
//!   [`reducer::Reducer`]
//! - Dependency injection via traits ([`document::DocumentStore`],
//!   [`identity::IdentityProvider`], [`environment::Clock`])
//! - Untyped documents stop at the boundary: every read goes through a coercion
//!   function that drops malformed records instead of propagating holes
//!
//! ## Example
//!
//! ```
//! use event_planner_core::document::{Direction, Filter, Query};
//!
//! let query = Query::all()
//!     .filter(Filter::eq("customerId", "c1"))
//!     .order_by("createdAt", Direction::Descending);
//!
//! assert_eq!(query.filters.len(), 1);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod document;
pub mod identity;
pub mod ids;
pub mod model;
pub mod timestamp;

/// Reducer module - the pure state-transition trait
///
/// Reducers are deterministic: `(State, Action) → State`. They never perform
/// I/O; the stores do the remote call first and then feed the outcome to the
/// reducer as an action.
pub mod reducer {
    /// The Reducer trait - core abstraction for cache mutation
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    ///
    /// # Example
    ///
    /// ```
    /// use event_planner_core::reducer::Reducer;
    ///
    /// struct Counter;
    ///
    /// impl Reducer for Counter {
    ///     type State = u32;
    ///     type Action = u32;
    ///
    ///     fn reduce(&self, state: &mut u32, action: u32) {
    ///         *state += action;
    ///     }
    /// }
    ///
    /// let mut state = 0;
    /// Counter.reduce(&mut state, 2);
    /// assert_eq!(state, 2);
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// Apply an action to state in place
        fn reduce(&self, state: &mut Self::State, action: Self::Action);
    }
}

/// Environment module - Dependency injection traits
///
/// All sources of nondeterminism are abstracted behind traits and injected.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use event_planner_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use document::{
    Direction, Document, DocumentStore, DocumentStoreError, Fields, Filter, OrderBy, Query,
    SnapshotStream,
};
pub use environment::{Clock, SystemClock};
pub use identity::{Identity, IdentityProvider, Role};
pub use reducer::Reducer;
