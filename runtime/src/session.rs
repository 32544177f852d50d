//! Session context.
//!
//! One [`Session`] per signed-in application session. It builds the four
//! stores over a shared [`Environment`], owns the live chat subscription and
//! ties its lifetime to the session: [`Session::identity_changed`] swaps it
//! for the new user, [`Session::dispose`] (or dropping the session) closes it.

use crate::bookings::BookingStore;
use crate::chat::{ChatStore, RoomSubscription};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::events::EventStore;
use crate::metrics;
use crate::notice::{Notice, Notifier};
use crate::vendors::VendorStore;
use crate::Environment;
use event_planner_core::ids::UserId;
use tokio::sync::{Mutex, broadcast};

/// All stores of one application session.
///
/// # Example
///
/// ```ignore
/// let session = Session::new(env, StoreConfig::from_env());
/// let mut notices = session.notices();
///
/// session.init().await?;
/// session.events().add(new_event).await?;
///
/// identity.sign_out();
/// session.identity_changed().await?;
/// session.dispose().await;
/// ```
#[derive(Debug)]
pub struct Session {
    env: Environment,
    config: StoreConfig,
    notifier: Notifier,
    events: EventStore,
    vendors: VendorStore,
    bookings: BookingStore,
    chat: ChatStore,
    subscription: Mutex<Option<RoomSubscription>>,
}

impl Session {
    /// Build every store over `env`
    #[must_use]
    pub fn new(env: Environment, config: StoreConfig) -> Self {
        metrics::describe();
        let notifier = Notifier::new(config.notice_capacity);
        Self {
            events: EventStore::new(env.clone(), &config, notifier.clone()),
            vendors: VendorStore::new(env.clone(), &config, notifier.clone()),
            bookings: BookingStore::new(env.clone(), &config, notifier.clone()),
            chat: ChatStore::new(env.clone(), &config, notifier.clone()),
            subscription: Mutex::new(None),
            env,
            config,
            notifier,
        }
    }

    /// Load every store and open the chat subscription for the signed-in
    /// user.
    ///
    /// All loads run even if one fails; each failure is already recorded in
    /// its store.
    ///
    /// # Errors
    ///
    /// The first failure, in events / vendors / bookings / chat order.
    #[tracing::instrument(skip(self))]
    pub async fn init(&self) -> Result<(), StoreError> {
        tracing::info!(identity = ?self.env.current_identity(), "Initializing session");
        let (events, vendors, bookings) =
            tokio::join!(self.events.fetch(), self.vendors.fetch(), self.bookings.fetch());
        let chat = self.resubscribe().await;
        events.and(vendors).and(bookings).and(chat)
    }

    /// Re-scope the session after a sign-in, sign-out or role change.
    ///
    /// The old chat subscription is closed before anything is re-fetched.
    /// Signed out, the identity-scoped stores end up empty. The vendor
    /// catalog is not identity-scoped and is left alone.
    ///
    /// # Errors
    ///
    /// The first failure, in events / bookings / chat order.
    #[tracing::instrument(skip(self))]
    pub async fn identity_changed(&self) -> Result<(), StoreError> {
        tracing::info!(identity = ?self.env.current_identity(), "Identity changed");
        self.release().await;
        let (events, bookings) = tokio::join!(self.events.fetch(), self.bookings.fetch());
        let chat = self.resubscribe().await;
        events.and(bookings).and(chat)
    }

    /// Close the chat subscription. Safe to call more than once.
    pub async fn dispose(&self) {
        if self.release().await {
            tracing::info!("Session disposed");
        }
    }

    /// User whose rooms are currently delivered, if any
    pub async fn subscribed_user(&self) -> Option<UserId> {
        self.subscription
            .lock()
            .await
            .as_ref()
            .map(|subscription| subscription.user().clone())
    }

    async fn resubscribe(&self) -> Result<(), StoreError> {
        let mut slot = self.subscription.lock().await;
        drop(slot.take());
        self.chat.clear();

        let Some(identity) = self.env.current_identity() else {
            return Ok(());
        };
        *slot = Some(self.chat.subscribe(&identity.user_id).await?);
        Ok(())
    }

    async fn release(&self) -> bool {
        self.subscription
            .lock()
            .await
            .take()
            .map(RoomSubscription::unsubscribe)
            .is_some()
    }

    /// Event store
    #[must_use]
    pub const fn events(&self) -> &EventStore {
        &self.events
    }

    /// Vendor store
    #[must_use]
    pub const fn vendors(&self) -> &VendorStore {
        &self.vendors
    }

    /// Booking store
    #[must_use]
    pub const fn bookings(&self) -> &BookingStore {
        &self.bookings
    }

    /// Chat store
    #[must_use]
    pub const fn chat(&self) -> &ChatStore {
        &self.chat
    }

    /// Configuration the stores were built with
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Injected dependencies
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.env
    }

    /// Receive every notice published from now on
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }
}
