//! Booking store.
//!
//! Bookings move through a fixed state machine:
//!
//! ```text
//! pending ──► accepted ──► completed
//!    │
//!    └──────► rejected
//! ```
//!
//! Every status change is checked against that table, using the cached
//! record, before anything is written. New bookings always start `pending`
//! and unsigned, whatever the caller passes in.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::metrics::RemoteCallMetrics;
use crate::notice::{Notice, Notifier};
use crate::retry::{self, RetryPolicy};
use crate::state::{CollectionAction, CollectionState, StateHandle};
use crate::{Environment, coerce_all, record_failure};
use event_planner_core::document::{Direction, Filter, Query, collections};
use event_planner_core::identity::{Identity, Role};
use event_planner_core::ids::{BookingId, EventId, UserId, VendorId};
use event_planner_core::model::{Booking, BookingPatch, BookingStatus, NewBooking};
use tokio::sync::watch;

const STORE: &str = "bookings";

/// Role-scoped cache of bookings.
#[derive(Clone, Debug)]
pub struct BookingStore {
    env: Environment,
    state: StateHandle<Booking>,
    notifier: Notifier,
    retry: RetryPolicy,
}

impl BookingStore {
    /// Create an empty store
    #[must_use]
    pub fn new(env: Environment, config: &StoreConfig, notifier: Notifier) -> Self {
        Self {
            env,
            state: StateHandle::new(),
            notifier,
            retry: config.retry_policy(),
        }
    }

    /// Persist a new booking and put it at the top of the cached list.
    ///
    /// The record is always created `pending` and unsigned, stamped with the
    /// session clock. It is only cached if the caller may see it.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::ValidationFailure`] for missing ids or a negative amount
    /// - [`StoreError::RemoteFailure`] if the write fails
    #[tracing::instrument(skip(self, booking), fields(vendor = %booking.vendor_id, event = %booking.event_id))]
    pub async fn create(&self, booking: NewBooking) -> Result<BookingId, StoreError> {
        const FAILED: &str = "Failed to create booking";

        let identity = self
            .env
            .require_identity()
            .map_err(|err| self.fail(err, FAILED))?;
        if booking.status.is_some_and(|status| status != BookingStatus::Pending)
            || booking.contract_signed == Some(true)
        {
            tracing::debug!("Ignoring caller-supplied initial booking state");
        }
        let mut draft = booking
            .into_draft(&self.env.now_iso())
            .map_err(|err| self.fail(err.into(), FAILED))?;

        let id = RemoteCallMetrics::observe(
            STORE,
            "create",
            self.env
                .documents
                .create(collections::BOOKINGS, draft.to_fields()),
        )
        .await
        .map_err(|err| self.fail(err.into(), FAILED))?;

        draft.id = BookingId::new(id);
        tracing::info!(booking_id = %draft.id, "Booking created");
        let id = draft.id.clone();
        if draft.is_visible_to(&identity) {
            self.state.send(CollectionAction::Inserted(draft));
        }
        self.notifier.publish(Notice::success(
            "Booking Created",
            "Your booking request has been sent to the vendor.",
        ));
        Ok(id)
    }

    /// Move a cached booking to `status`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::NotFound`] if the booking is not cached, or no longer
    ///   exists remotely
    /// - [`StoreError::InvalidTransition`] if the state machine forbids the
    ///   change; nothing is written
    /// - [`StoreError::RemoteFailure`] if the write fails
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, id: &BookingId, status: BookingStatus) -> Result<(), StoreError> {
        const FAILED: &str = "Failed to update booking";

        self.env
            .require_identity()
            .map_err(|err| self.fail(err, FAILED))?;
        let current = self.cached(id).map_err(|err| self.fail(err, FAILED))?;
        current
            .status
            .transition(status)
            .map_err(|err| self.fail(err.into(), FAILED))?;

        let patch = BookingPatch::status(status, &self.env.now_iso());
        self.write(id, patch, FAILED).await?;

        tracing::info!(from = %current.status, to = %status, "Booking status changed");
        self.notifier.publish(Notice::success(
            "Booking Updated",
            format!("Booking status has been updated to {status}."),
        ));
        Ok(())
    }

    /// Mark a cached booking's contract as signed. Irreversible.
    ///
    /// Signing again with the same URL succeeds without writing.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::ValidationFailure`] for a blank URL, or a different URL
    ///   on an already-signed booking
    /// - [`StoreError::NotFound`] if the booking is not cached, or no longer
    ///   exists remotely
    /// - [`StoreError::InvalidTransition`] if the booking was rejected
    /// - [`StoreError::RemoteFailure`] if the write fails
    #[tracing::instrument(skip(self))]
    pub async fn sign_contract(&self, id: &BookingId, contract_url: &str) -> Result<(), StoreError> {
        const FAILED: &str = "Failed to sign contract";

        self.env
            .require_identity()
            .map_err(|err| self.fail(err, FAILED))?;
        let contract_url = contract_url.trim();
        if contract_url.is_empty() {
            return Err(self.fail(
                StoreError::ValidationFailure("contractUrl is required".to_owned()),
                FAILED,
            ));
        }
        let current = self.cached(id).map_err(|err| self.fail(err, FAILED))?;
        if current.status == BookingStatus::Rejected {
            return Err(self.fail(
                StoreError::InvalidTransition {
                    from: BookingStatus::Rejected,
                    to: BookingStatus::Accepted,
                },
                FAILED,
            ));
        }

        if current.contract_signed {
            if current.contract_url.as_deref() != Some(contract_url) {
                return Err(self.fail(
                    StoreError::ValidationFailure(
                        "contract is already signed with a different document".to_owned(),
                    ),
                    FAILED,
                ));
            }
            tracing::debug!("Contract already signed");
        } else {
            let patch = BookingPatch::signed(contract_url, &self.env.now_iso());
            self.write(id, patch, FAILED).await?;
            tracing::info!("Contract signed");
        }

        self.notifier.publish(Notice::success(
            "Contract Signed",
            "The contract has been signed and uploaded successfully.",
        ));
        Ok(())
    }

    async fn write(&self, id: &BookingId, patch: BookingPatch, failed: &str) -> Result<(), StoreError> {
        RemoteCallMetrics::observe(
            STORE,
            "update",
            self.env
                .documents
                .update(collections::BOOKINGS, id.as_str(), patch.to_fields()),
        )
        .await
        .map_err(|err| self.fail(StoreError::remote("booking", id.as_str(), err), failed))?;

        self.state.send(CollectionAction::Patched {
            id: id.clone(),
            patch,
        });
        Ok(())
    }

    fn cached(&self, id: &BookingId) -> Result<Booking, StoreError> {
        self.get(id).ok_or_else(|| StoreError::NotFound {
            entity: "booking",
            id: id.to_string(),
        })
    }

    /// Replace the cached list with the bookings `actor` sees in `role`,
    /// newest first: a vendor's incoming bookings, a customer's own, or all
    /// of them for an admin.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::RemoteFailure`] once retries are exhausted; the list
    ///   is emptied
    ///
    /// A result that lands after a newer fetch, or after the signed-in
    /// identity changed, is discarded.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_for(&self, role: Role, actor: &UserId) -> Result<(), StoreError> {
        let identity = match self.env.require_identity() {
            Ok(identity) => identity,
            Err(err) => {
                self.state
                    .supersede(CollectionAction::LoadFailed(err.to_string()));
                return Err(err);
            }
        };
        let generation = self.state.start();

        let scope = Identity::new(actor.clone(), role);
        let query = match role {
            Role::Vendor => Query::all().filter(Filter::eq("vendorId", actor.as_str())),
            Role::Customer => Query::all().filter(Filter::eq("customerId", actor.as_str())),
            Role::Admin => Query::all(),
        }
        .order_by("createdAt", Direction::Descending);

        let result = retry::read(&self.retry, STORE, "query", || {
            self.env.documents.query(collections::BOOKINGS, query.clone())
        })
        .await;

        if self.env.current_identity().as_ref() != Some(&identity) {
            tracing::warn!(
                user = %identity.user_id,
                "Identity changed during fetch, discarding bookings"
            );
            self.state.finish(generation, CollectionAction::Loaded(Vec::new()));
            return Ok(());
        }

        match result {
            Ok(documents) => {
                let bookings: Vec<Booking> =
                    coerce_all(collections::BOOKINGS, &documents, Booking::from_document)
                        .into_iter()
                        .filter(|booking| booking.is_visible_to(&scope))
                        .collect();
                tracing::debug!(count = bookings.len(), "Bookings loaded");
                if !self.state.finish(generation, CollectionAction::Loaded(bookings)) {
                    tracing::debug!("Superseded, dropping bookings");
                }
                Ok(())
            }
            Err(err) => {
                let err = StoreError::from(err);
                tracing::error!(error = %err, "Failed to fetch bookings");
                if self
                    .state
                    .finish(generation, CollectionAction::LoadFailed(err.to_string()))
                {
                    self.notifier
                        .publish(Notice::error("Error", "Failed to fetch bookings"));
                }
                Err(err)
            }
        }
    }

    /// [`BookingStore::fetch_for`] the signed-in identity. Signed out, the
    /// list is cleared.
    ///
    /// # Errors
    ///
    /// Same as [`BookingStore::fetch_for`].
    pub async fn fetch(&self) -> Result<(), StoreError> {
        match self.env.current_identity() {
            Some(identity) => self.fetch_for(identity.role, &identity.user_id).await,
            None => {
                self.state.supersede(CollectionAction::Loaded(Vec::new()));
                Ok(())
            }
        }
    }

    /// Cached booking by id. Never suspends.
    #[must_use]
    pub fn get(&self, id: &BookingId) -> Option<Booking> {
        self.state.state(|state| state.get(id).cloned())
    }

    /// Bookings made with a vendor, newest first. Bypasses the cache.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::RemoteFailure`] once retries are exhausted
    pub async fn get_by_vendor(&self, vendor_id: &VendorId) -> Result<Vec<Booking>, StoreError> {
        self.one_shot(Filter::eq("vendorId", vendor_id.as_str())).await
    }

    /// Bookings made by a customer, newest first. Bypasses the cache.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::RemoteFailure`] once retries are exhausted
    pub async fn get_by_customer(&self, customer_id: &UserId) -> Result<Vec<Booking>, StoreError> {
        self.one_shot(Filter::eq("customerId", customer_id.as_str())).await
    }

    /// Bookings for an event, newest first. Bypasses the cache.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::RemoteFailure`] once retries are exhausted
    pub async fn get_by_event(&self, event_id: &EventId) -> Result<Vec<Booking>, StoreError> {
        self.one_shot(Filter::eq("eventId", event_id.as_str())).await
    }

    async fn one_shot(&self, filter: Filter) -> Result<Vec<Booking>, StoreError> {
        self.env.require_identity()?;
        let query = Query::all()
            .filter(filter)
            .order_by("createdAt", Direction::Descending);
        let documents = retry::read(&self.retry, STORE, "lookup", || {
            self.env.documents.query(collections::BOOKINGS, query.clone())
        })
        .await
        .inspect_err(|err| tracing::error!(error = %err, "Failed to look up bookings"))?;

        Ok(coerce_all(collections::BOOKINGS, &documents, Booking::from_document))
    }

    /// Snapshot of the cached bookings
    #[must_use]
    pub fn items(&self) -> Vec<Booking> {
        self.state.state(|state| state.items.clone())
    }

    /// Snapshot of the whole state
    #[must_use]
    pub fn state(&self) -> CollectionState<Booking> {
        self.state.state(Clone::clone)
    }

    /// Watch every change to the state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<Booking>> {
        self.state.subscribe()
    }

    fn fail(&self, err: StoreError, description: &str) -> StoreError {
        record_failure(&self.state, &self.notifier, err, description)
    }
}
