//! Vendor store.
//!
//! Holds the vendor catalog and sends quotation requests. A fetch shows
//! either the remote catalog or the bundled one, never a mix of both.

use crate::catalog;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::metrics::{self, RemoteCallMetrics};
use crate::notice::{Notice, Notifier};
use crate::retry::{self, RetryPolicy};
use crate::state::{CollectionAction, CollectionState, StateHandle};
use crate::{Environment, coerce_all, record_failure};
use event_planner_core::document::{Direction, Filter, Query, collections};
use event_planner_core::ids::VendorId;
use event_planner_core::model::{QuotationDetails, QuotationRequest, Vendor};
use event_planner_core::timestamp;
use std::sync::Arc;
use tokio::sync::watch;

const STORE: &str = "vendors";

/// Where the currently held catalog came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CatalogSource {
    /// Nothing fetched yet
    #[default]
    None,
    /// The remote vendor collection
    Remote,
    /// The bundled catalog
    Fallback,
}

/// Vendor catalog and quotation workflow.
#[derive(Clone, Debug)]
pub struct VendorStore {
    env: Environment,
    state: StateHandle<Vendor>,
    source: Arc<watch::Sender<CatalogSource>>,
    notifier: Notifier,
    retry: RetryPolicy,
    fallback: bool,
}

impl VendorStore {
    /// Create an empty store
    #[must_use]
    pub fn new(env: Environment, config: &StoreConfig, notifier: Notifier) -> Self {
        let (source, _) = watch::channel(CatalogSource::None);
        Self {
            env,
            state: StateHandle::new(),
            source: Arc::new(source),
            notifier,
            retry: config.retry_policy(),
            fallback: config.vendor_fallback,
        }
    }

    /// Load the catalog.
    ///
    /// An empty remote collection, or one whose every record fails coercion,
    /// is replaced by the bundled catalog. So is a failed query, which also
    /// publishes a warning notice but is not an error.
    ///
    /// # Errors
    ///
    /// [`StoreError::RemoteFailure`] only when the fallback is disabled.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self) -> Result<(), StoreError> {
        let generation = self.state.start();

        let result = retry::read(&self.retry, STORE, "query", || {
            self.env.documents.query(collections::VENDORS, Query::all())
        })
        .await;

        match result {
            Ok(documents) => {
                let vendors = coerce_all(collections::VENDORS, &documents, Vendor::from_document);
                if vendors.is_empty() && self.fallback {
                    tracing::info!("Remote vendor catalog is empty, using bundled catalog");
                    self.use_fallback(generation, "empty");
                } else {
                    let count = vendors.len();
                    if self.state.finish(generation, CollectionAction::Loaded(vendors)) {
                        tracing::debug!(count, "Vendors loaded");
                        self.source.send_replace(CatalogSource::Remote);
                    }
                }
                Ok(())
            }
            Err(err) if self.fallback => {
                tracing::warn!(error = %err, "Failed to fetch vendors, using bundled catalog");
                if self.use_fallback(generation, "unavailable") {
                    self.notifier.publish(Notice::warning(
                        "Error loading vendors",
                        "There was a problem loading the vendors. Please try again.",
                    ));
                }
                Ok(())
            }
            Err(err) => {
                let err = StoreError::from(err);
                tracing::error!(error = %err, "Failed to fetch vendors");
                if self
                    .state
                    .finish(generation, CollectionAction::LoadFailed(err.to_string()))
                {
                    self.source.send_replace(CatalogSource::None);
                    self.notifier.publish(Notice::error(
                        "Error loading vendors",
                        "There was a problem loading the vendors. Please try again.",
                    ));
                }
                Err(err)
            }
        }
    }

    /// Same as [`VendorStore::fetch`].
    ///
    /// # Errors
    ///
    /// Same as [`VendorStore::fetch`].
    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.fetch().await
    }

    fn use_fallback(&self, generation: u64, reason: &'static str) -> bool {
        let applied = self
            .state
            .finish(generation, CollectionAction::Loaded(catalog::fallback_vendors()));
        if applied {
            metrics::record_fallback(reason);
            self.source.send_replace(CatalogSource::Fallback);
        }
        applied
    }

    /// Where the held catalog came from
    #[must_use]
    pub fn source(&self) -> CatalogSource {
        *self.source.borrow()
    }

    /// Held vendor by id. Never suspends.
    #[must_use]
    pub fn get(&self, id: &VendorId) -> Option<Vendor> {
        self.state.state(|state| state.get(id).cloned())
    }

    /// Held vendors of one category (case-insensitive)
    #[must_use]
    pub fn by_category(&self, category: &str) -> Vec<Vendor> {
        self.state.state(|state| {
            state
                .items
                .iter()
                .filter(|vendor| vendor.category.eq_ignore_ascii_case(category))
                .cloned()
                .collect()
        })
    }

    /// Held vendors whose name, location, category or a specialty contains
    /// `text`. Blank text matches everything.
    #[must_use]
    pub fn search(&self, text: &str) -> Vec<Vendor> {
        self.state.state(|state| {
            state
                .items
                .iter()
                .filter(|vendor| vendor.matches_text(text))
                .cloned()
                .collect()
        })
    }

    /// Send a quotation request to a vendor.
    ///
    /// Returns whether the request was stored. Signed out, nothing is
    /// written. Every outcome publishes a notice.
    #[tracing::instrument(skip(self, details))]
    pub async fn request_quotation(&self, vendor_id: &VendorId, details: QuotationDetails) -> bool {
        const FAILED: &str = "Failed to send quotation request";

        let Some(identity) = self.env.current_identity() else {
            tracing::debug!("Quotation requested while signed out");
            self.notifier.publish(Notice::error(
                "Error",
                "You must be logged in to request a quotation",
            ));
            return false;
        };

        let fields = match details.into_fields(
            vendor_id.clone(),
            identity.user_id.clone(),
            timestamp::server_timestamp(),
        ) {
            Ok(fields) => fields,
            Err(err) => {
                self.fail(err.into(), FAILED);
                return false;
            }
        };

        match RemoteCallMetrics::observe(
            STORE,
            "request_quotation",
            self.env.documents.create(collections::QUOTATIONS, fields),
        )
        .await
        {
            Ok(id) => {
                tracing::info!(quotation_id = %id, "Quotation request sent");
                self.notifier
                    .publish(Notice::success("Success", "Quotation request sent successfully"));
                true
            }
            Err(err) => {
                self.fail(err.into(), FAILED);
                false
            }
        }
    }

    /// Quotation requests addressed to a vendor, newest first.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::RemoteFailure`] once retries are exhausted
    pub async fn quotations_for(
        &self,
        vendor_id: &VendorId,
    ) -> Result<Vec<QuotationRequest>, StoreError> {
        self.env.require_identity()?;
        self.quotations(Filter::eq("vendorId", vendor_id.as_str()))
            .await
    }

    /// Quotation requests sent by the caller, newest first.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unauthenticated`] when signed out
    /// - [`StoreError::RemoteFailure`] once retries are exhausted
    pub async fn my_quotations(&self) -> Result<Vec<QuotationRequest>, StoreError> {
        let identity = self.env.require_identity()?;
        self.quotations(Filter::eq("userId", identity.user_id.as_str()))
            .await
    }

    async fn quotations(&self, filter: Filter) -> Result<Vec<QuotationRequest>, StoreError> {
        let query = Query::all()
            .filter(filter)
            .order_by("createdAt", Direction::Descending);
        let documents = retry::read(&self.retry, STORE, "quotations", || {
            self.env.documents.query(collections::QUOTATIONS, query.clone())
        })
        .await
        .inspect_err(|err| tracing::error!(error = %err, "Failed to fetch quotations"))?;

        Ok(coerce_all(
            collections::QUOTATIONS,
            &documents,
            QuotationRequest::from_document,
        ))
    }

    /// Snapshot of the held catalog
    #[must_use]
    pub fn items(&self) -> Vec<Vendor> {
        self.state.state(|state| state.items.clone())
    }

    /// Snapshot of the whole state
    #[must_use]
    pub fn state(&self) -> CollectionState<Vendor> {
        self.state.state(Clone::clone)
    }

    /// Watch every change to the state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<Vendor>> {
        self.state.subscribe()
    }

    fn fail(&self, err: StoreError, description: &str) -> StoreError {
        record_failure(&self.state, &self.notifier, err, description)
    }
}
