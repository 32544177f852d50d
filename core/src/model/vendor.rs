//! Vendor catalog entries and quotation requests.

use super::{CoercionError, Entity, InvalidInput, decode, encode, require_amount, require_text};
use crate::document::{Document, Fields};
use crate::ids::{QuotationId, UserId, VendorId};
use crate::timestamp::{self, iso};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;

/// Price band advertised by a vendor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Currency symbol
    pub currency: String,
}

/// How to reach a vendor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Phone number
    #[serde(default)]
    pub phone: String,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Website host
    #[serde(default)]
    pub website: String,
    /// Opening hours label
    #[serde(default)]
    pub hours: String,
}

/// A catalog entry. Read-only from this crate's point of view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    /// Document id
    pub id: VendorId,
    /// Business name
    pub name: String,
    /// Category (Catering, Photography, …)
    #[serde(rename = "type", default)]
    pub category: String,
    /// City / region
    #[serde(default)]
    pub location: String,
    /// Street address
    #[serde(default)]
    pub address: String,
    /// Average rating, 0 to 5
    #[serde(default)]
    pub rating: f64,
    /// Review count
    #[serde(default)]
    pub reviews: u32,
    /// Advertised price band
    #[serde(default)]
    pub price_range: PriceRange,
    /// Contact details
    #[serde(flatten)]
    pub contact: ContactInfo,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Offered services, in display order
    #[serde(default)]
    pub services: Vec<String>,
    /// Gallery image URLs, in display order
    #[serde(default)]
    pub images: Vec<String>,
    /// Specialty tags
    #[serde(default)]
    pub specialties: Vec<String>,
    /// Whether the vendor is taking bookings
    #[serde(default)]
    pub availability: bool,
    /// Typical response time label
    #[serde(default)]
    pub response_time: String,
    /// Experience label
    #[serde(default)]
    pub experience: String,
}

impl Vendor {
    /// Coerce a remote document, failing closed.
    ///
    /// # Errors
    ///
    /// [`CoercionError`] if the body is malformed, the name is blank, the
    /// rating is outside `0..=5` or the price band is inverted.
    pub fn from_document(document: &Document) -> Result<Self, CoercionError> {
        let vendor: Self = decode("vendor", document)?;
        vendor.check().map_err(|reason| CoercionError::Invalid {
            entity: "vendor",
            id: document.id.clone(),
            reason,
        })?;
        Ok(vendor)
    }

    /// Field-level invariants shared by remote and bundled entries.
    ///
    /// # Errors
    ///
    /// A description of the first violated invariant.
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is blank".to_owned());
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(format!("rating {} is outside 0..=5", self.rating));
        }
        if self.price_range.min > self.price_range.max {
            return Err("price range min exceeds max".to_owned());
        }
        Ok(())
    }

    /// Case-insensitive match on name, location, category or a specialty.
    #[must_use]
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [&self.name, &self.location, &self.category]
            .into_iter()
            .chain(self.specialties.iter())
            .any(|haystack| haystack.to_lowercase().contains(&needle))
    }
}

/// Vendors are read-only from this side; there is nothing to patch.
impl Entity for Vendor {
    type Id = VendorId;
    type Patch = Infallible;

    fn id(&self) -> &VendorId {
        &self.id
    }

    fn apply(&mut self, patch: &Infallible) {
        match *patch {}
    }
}

/// Lifecycle of a quotation request. Only `Pending` is ever written here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    /// Awaiting the vendor
    Pending,
    /// Vendor accepted
    Accepted,
    /// Vendor declined
    Rejected,
}

/// A persisted quotation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationRequest {
    /// Document id
    pub id: QuotationId,
    /// Vendor being asked
    pub vendor_id: VendorId,
    /// Requesting user
    pub user_id: UserId,
    /// Date of the event (canonical ISO)
    #[serde(deserialize_with = "iso::deserialize")]
    pub event_date: String,
    /// Event type tag
    #[serde(default)]
    pub event_type: String,
    /// Expected guests
    #[serde(default)]
    pub guest_count: u32,
    /// Customer budget
    #[serde(default)]
    pub budget: f64,
    /// Free-text requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    /// Current status as written by the vendor-facing flow
    pub status: QuotationStatus,
    /// Server-stamped creation time (canonical ISO)
    #[serde(deserialize_with = "iso::deserialize")]
    pub created_at: String,
}

impl QuotationRequest {
    /// Coerce a remote document, failing closed.
    ///
    /// # Errors
    ///
    /// [`CoercionError::Malformed`] if the body does not have the request's
    /// shape or a timestamp is unreadable.
    pub fn from_document(document: &Document) -> Result<Self, CoercionError> {
        decode("quotation", document)
    }
}

/// What the customer fills in when asking a vendor for a quote.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationDetails {
    /// Date of the event
    pub event_date: String,
    /// Event type tag
    pub event_type: String,
    /// Expected guests
    pub guest_count: u32,
    /// Customer budget
    pub budget: f64,
    /// Free-text requirements
    pub requirements: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuotationBody {
    vendor_id: VendorId,
    user_id: UserId,
    event_date: String,
    event_type: String,
    guest_count: u32,
    budget: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    requirements: Option<String>,
    status: QuotationStatus,
    created_at: Value,
}

impl QuotationDetails {
    /// Check the form input.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<(), InvalidInput> {
        timestamp::parse_str(&self.event_date)
            .map_err(|err| InvalidInput::new(format!("eventDate: {err}")))?;
        require_text("eventType", &self.event_type)?;
        require_amount("budget", self.budget)
    }

    /// Render the persisted request: always `pending`, stamped with the
    /// requesting user and `created_at`.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] if [`QuotationDetails::validate`] fails.
    pub fn into_fields(
        self,
        vendor_id: VendorId,
        user_id: UserId,
        created_at: Value,
    ) -> Result<Fields, InvalidInput> {
        self.validate()?;
        let event_date = timestamp::normalize_str(&self.event_date)
            .map_err(|err| InvalidInput::new(format!("eventDate: {err}")))?;
        Ok(encode(&QuotationBody {
            vendor_id,
            user_id,
            event_date,
            event_type: self.event_type,
            guest_count: self.guest_count,
            budget: self.budget,
            requirements: self.requirements.filter(|text| !text.trim().is_empty()),
            status: QuotationStatus::Pending,
            created_at,
        }))
    }
}
