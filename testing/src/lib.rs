//! # Event Planner Testing
//!
//! Testing utilities for the event planner data layer.
//!
//! This crate provides:
//! - [`InMemoryDocumentStore`]: a `DocumentStore` with live subscriptions,
//!   failure injection and call counters
//! - Mock implementations of the environment seams (clocks, identity)
//! - [`ReducerTest`]: Given-When-Then assertions for reducers
//! - proptest strategies for identities
//!
//! ## Example
//!
//! ```ignore
//! use event_planner_testing::{InMemoryDocumentStore, MutableIdentity, test_clock};
//!
//! #[tokio::test]
//! async fn customer_sees_own_events() {
//!     let documents = Arc::new(InMemoryDocumentStore::new());
//!     let identity = Arc::new(MutableIdentity::signed_in(Identity::customer("a")));
//!     let session = Session::new(Environment::new(documents, identity, Arc::new(test_clock())), StoreConfig::default());
//!
//!     session.events().fetch().await?;
//!     assert!(session.events().items().is_empty());
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use event_planner_core::environment::Clock;
use event_planner_core::identity::{Identity, IdentityProvider};

pub mod document_store;
pub mod reducer_test;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Identity, IdentityProvider, Utc};
    use std::sync::{Mutex, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use event_planner_testing::mocks::FixedClock;
    /// use event_planner_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// 2025-01-01 00:00:00 UTC
    ///
    /// # Panics
    ///
    /// Never in practice: the timestamp is a constant.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Clock that advances by a fixed step on every read.
    ///
    /// Writes stamped by an [`crate::InMemoryDocumentStore`] using this clock
    /// get strictly increasing timestamps, so newest-first ordering is
    /// deterministic.
    ///
    /// ```
    /// use event_planner_testing::mocks::SteppingClock;
    /// use event_planner_core::environment::Clock;
    ///
    /// let clock = SteppingClock::default();
    /// assert!(clock.now() < clock.now());
    /// ```
    #[derive(Debug)]
    pub struct SteppingClock {
        next: Mutex<DateTime<Utc>>,
        step: Duration,
    }

    impl SteppingClock {
        /// Start at `start`, advancing by `step` per call
        #[must_use]
        pub const fn new(start: DateTime<Utc>, step: Duration) -> Self {
            Self {
                next: Mutex::new(start),
                step,
            }
        }
    }

    impl Default for SteppingClock {
        /// Starts at [`test_epoch`], one second per tick
        fn default() -> Self {
            Self::new(test_epoch(), Duration::seconds(1))
        }
    }

    impl Clock for SteppingClock {
        #[allow(clippy::unwrap_used)] // Mutex poison is unrecoverable in tests
        fn now(&self) -> DateTime<Utc> {
            let mut next = self.next.lock().unwrap();
            let now = *next;
            *next = now + self.step;
            now
        }
    }

    /// Identity provider whose identity tests can swap at will.
    #[derive(Debug, Default)]
    pub struct MutableIdentity {
        current: RwLock<Option<Identity>>,
    }

    impl MutableIdentity {
        /// Nobody signed in
        #[must_use]
        pub fn signed_out() -> Self {
            Self::default()
        }

        /// `identity` signed in
        #[must_use]
        pub fn signed_in(identity: Identity) -> Self {
            Self {
                current: RwLock::new(Some(identity)),
            }
        }

        /// Replace the signed-in identity
        #[allow(clippy::unwrap_used)] // Lock poison is unrecoverable in tests
        pub fn sign_in(&self, identity: Identity) {
            *self.current.write().unwrap() = Some(identity);
        }

        /// Sign out
        #[allow(clippy::unwrap_used)] // Lock poison is unrecoverable in tests
        pub fn sign_out(&self) {
            *self.current.write().unwrap() = None;
        }
    }

    impl IdentityProvider for MutableIdentity {
        #[allow(clippy::unwrap_used)] // Lock poison is unrecoverable in tests
        fn current_identity(&self) -> Option<Identity> {
            self.current.read().unwrap().clone()
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Install a `fmt` subscriber honouring `RUST_LOG` (default `warn`).
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use event_planner_core::identity::{Identity, Role};
    use proptest::prelude::*;

    /// Any of the three roles
    pub fn role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Customer), Just(Role::Admin), Just(Role::Vendor)]
    }

    /// A short user id from a small pool, so generated identities collide
    pub fn user_id() -> impl Strategy<Value = String> {
        "u[0-4]"
    }

    /// A non-admin identity
    pub fn non_admin() -> impl Strategy<Value = Identity> {
        (user_id(), prop_oneof![Just(Role::Customer), Just(Role::Vendor)])
            .prop_map(|(id, role)| Identity::new(id, role))
    }

    /// Any identity
    pub fn identity() -> impl Strategy<Value = Identity> {
        (user_id(), role()).prop_map(|(id, role)| Identity::new(id, role))
    }
}

// Re-export commonly used items
pub use document_store::InMemoryDocumentStore;
pub use helpers::init_test_tracing;
pub use mocks::{FixedClock, MutableIdentity, SteppingClock, test_clock};
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn stepping_clock_advances() {
        let clock = SteppingClock::new(mocks::test_epoch(), Duration::milliseconds(5));
        let first = clock.now();
        assert_eq!(clock.now() - first, Duration::milliseconds(5));
    }

    #[test]
    fn identity_can_be_swapped() {
        let identity = MutableIdentity::signed_out();
        assert_eq!(identity.current_identity(), None);
        identity.sign_in(Identity::admin("root"));
        assert_eq!(identity.current_identity(), Some(Identity::admin("root")));
        identity.sign_out();
        assert_eq!(identity.current_identity(), None);
    }
}
