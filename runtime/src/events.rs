//! Event store.
//!
//! Holds the events visible to the signed-in identity: everything for an
//! admin, only their own events for anyone else. Creates re-fetch instead of
//! inserting locally, so the list only ever shows normalized records.
//! Updates and deletes patch the cached list in place.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::metrics::RemoteCallMetrics;
use crate::notice::{Notice, Notifier};
use crate::retry::{self, RetryPolicy};
use crate::state::{CollectionAction, CollectionState, StateHandle};
use crate::{Environment, coerce_all, record_failure};
use chrono::{DateTime, Utc};
use event_planner_core::document::{Filter, Query, collections};
use event_planner_core::ids::EventId;
use event_planner_core::model::{EventItem, EventPatch, NewEvent, PaymentStatus};
use event_planner_core::timestamp;
use tokio::sync::watch;

const STORE: &str = "events";

/// Role-scoped cache of events.
#[derive(Clone, Debug)]
pub struct EventStore {
    env: Environment,
    state: StateHandle<EventItem>,
    notifier: Notifier,
    retry: RetryPolicy,
    consultancy_fee: f64,
}

impl EventStore {
    /// Create an empty store
    #[must_use]
    pub fn new(env: Environment, config: &StoreConfig, notifier: Notifier) -> Self {
        Self {
            env,
            state: StateHandle::new(),
            notifier,
            retry: config.retry_policy(),
            consultancy_fee: config.consultancy_fee,
        }
    }

    /// Replace the cached list with the caller's events, newest first.
    ///
    /// Signed out, the list is simply cleared. Records that fail coercion are
    /// dropped. A failed query empties the list. A result that arrives after a
    /// newer fetch started, or after the identity changed, is discarded.
    ///
    /// # Errors
    ///
    /// [`StoreError::RemoteFailure`] once retries are exhausted.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self) -> Result<(), StoreError> {
        let Some(identity) = self.env.current_identity() else {
            tracing::debug!("No identity, clearing events");
            self.state.supersede(CollectionAction::Loaded(Vec::new()));
            return Ok(());
        };

        let generation = self.state.start();

        let mut query = Query::all();
        if !identity.role.is_admin() {
            query = query.filter(Filter::eq("createdBy", identity.user_id.as_str()));
        }
        tracing::debug!(role = %identity.role, user = %identity.user_id, "Querying events");

        let result = retry::read(&self.retry, STORE, "query", || {
            self.env.documents.query(collections::EVENTS, query.clone())
        })
        .await;

        if self.env.current_identity().as_ref() != Some(&identity) {
            tracing::warn!(
                user = %identity.user_id,
                "Identity changed during fetch, discarding events"
            );
            self.state.finish(generation, CollectionAction::Loaded(Vec::new()));
            return Ok(());
        }

        match result {
            Ok(documents) => {
                let mut events: Vec<EventItem> =
                    coerce_all(collections::EVENTS, &documents, EventItem::from_document)
                        .into_iter()
                        .filter(|event| event.is_visible_to(&identity))
                        .collect();
                events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                tracing::debug!(count = events.len(), "Events loaded");
                if !self.state.finish(generation, CollectionAction::Loaded(events)) {
                    tracing::debug!("Superseded, dropping events");
                }
                Ok(())
            }
            Err(err) => {
                let err = StoreError::from(err);
                tracing::error!(error = %err, "Failed to fetch events");
                if self
                    .state
                    .finish(generation, CollectionAction::LoadFailed(err.to_string()))
                {
                    self.notifier.publish(Notice::error(
                        "Error loading events",
                        "Failed to fetch events. Please try again.",
                    ));
                }
                Err(err)
            }
        }
    }

    /// Persist a new event owned by the caller, then re-fetch.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::ValidationFailure`] for a blank title, unreadable date
    ///   or negative budget
    /// - [`StoreError::RemoteFailure`] if the write fails
    #[tracing::instrument(skip(self, event), fields(title = %event.title))]
    pub async fn add(&self, event: NewEvent) -> Result<EventId, StoreError> {
        const FAILED: &str = "Failed to create event";

        let identity = self
            .env
            .require_identity()
            .map_err(|err| self.fail(err, FAILED))?;
        let fields = event
            .into_fields(&identity, timestamp::server_timestamp())
            .map_err(|err| self.fail(err.into(), FAILED))?;

        let id = RemoteCallMetrics::observe(
            STORE,
            "create",
            self.env.documents.create(collections::EVENTS, fields),
        )
        .await
        .map_err(|err| self.fail(err.into(), FAILED))?;

        let id = EventId::new(id);
        tracing::info!(event_id = %id, "Event created");
        self.notifier
            .publish(Notice::success("Success", "Event created successfully"));

        if let Err(err) = self.fetch().await {
            tracing::warn!(error = %err, "Event created but re-fetch failed");
        }
        Ok(id)
    }

    /// Cached event by id. Never suspends.
    #[must_use]
    pub fn get(&self, id: &EventId) -> Option<EventItem> {
        self.state.state(|state| state.get(id).cloned())
    }

    /// Persist a partial update and merge it into the cached record.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::ValidationFailure`] for an empty or invalid patch
    /// - [`StoreError::NotFound`] if the event no longer exists remotely
    /// - [`StoreError::RemoteFailure`] if the write fails
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, id: &EventId, patch: EventPatch) -> Result<(), StoreError> {
        const FAILED: &str = "Failed to update event";

        self.env
            .require_identity()
            .map_err(|err| self.fail(err, FAILED))?;
        let patch = patch
            .normalized()
            .map_err(|err| self.fail(err.into(), FAILED))?;

        RemoteCallMetrics::observe(
            STORE,
            "update",
            self.env
                .documents
                .update(collections::EVENTS, id.as_str(), patch.to_fields()),
        )
        .await
        .map_err(|err| self.fail(StoreError::remote("event", id.as_str(), err), FAILED))?;

        tracing::info!("Event updated");
        self.state.send(CollectionAction::Patched {
            id: id.clone(),
            patch,
        });
        self.notifier
            .publish(Notice::success("Success", "Event updated successfully"));
        Ok(())
    }

    /// Delete an event and drop it from the cached list.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::RemoteFailure`] if the delete fails
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &EventId) -> Result<(), StoreError> {
        const FAILED: &str = "Failed to delete event";

        self.env
            .require_identity()
            .map_err(|err| self.fail(err, FAILED))?;

        RemoteCallMetrics::observe(
            STORE,
            "delete",
            self.env.documents.delete(collections::EVENTS, id.as_str()),
        )
        .await
        .map_err(|err| self.fail(StoreError::remote("event", id.as_str(), err), FAILED))?;

        tracing::info!("Event deleted");
        self.state.send(CollectionAction::Removed(id.clone()));
        self.notifier
            .publish(Notice::success("Success", "Event deleted successfully"));
        Ok(())
    }

    /// Record the consultancy fee as paid.
    ///
    /// # Errors
    ///
    /// Same as [`EventStore::update`].
    pub async fn mark_consultancy_fee_paid(&self, id: &EventId) -> Result<(), StoreError> {
        self.update(id, EventPatch::fee_paid()).await
    }

    /// Consultancy fee state of a cached event
    #[must_use]
    pub fn payment_status(&self, id: &EventId) -> Option<PaymentStatus> {
        self.state.state(|state| {
            state
                .get(id)
                .map(|event| event.payment_status(self.consultancy_fee))
        })
    }

    /// Cached events with the given type tag (case-insensitive)
    #[must_use]
    pub fn by_type(&self, event_type: &str) -> Vec<EventItem> {
        self.state.state(|state| {
            state
                .items
                .iter()
                .filter(|event| event.event_type.eq_ignore_ascii_case(event_type))
                .cloned()
                .collect()
        })
    }

    /// Cached events dated at or after `now`, soonest first
    #[must_use]
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<EventItem> {
        let now = timestamp::to_iso(now);
        let mut events: Vec<EventItem> = self.state.state(|state| {
            state
                .items
                .iter()
                .filter(|event| event.date >= now)
                .cloned()
                .collect()
        });
        events.sort_by(|a, b| a.date.cmp(&b.date));
        events
    }

    /// Snapshot of the cached events
    #[must_use]
    pub fn items(&self) -> Vec<EventItem> {
        self.state.state(|state| state.items.clone())
    }

    /// Snapshot of the whole state
    #[must_use]
    pub fn state(&self) -> CollectionState<EventItem> {
        self.state.state(Clone::clone)
    }

    /// Watch every change to the state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<EventItem>> {
        self.state.subscribe()
    }

    fn fail(&self, err: StoreError, description: &str) -> StoreError {
        record_failure(&self.state, &self.notifier, err, description)
    }
}
