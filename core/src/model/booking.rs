//! Bookings and their status state machine.
//!
//! ```text
//! pending ──► accepted ──► completed
//!    │
//!    └──────► rejected
//! ```
//!
//! `completed` and `rejected` are terminal. The guard runs before any write,
//! so an illegal transition never reaches the document store.

use super::{CoercionError, Entity, InvalidInput, decode, encode, require_amount, require_text};
use crate::document::{Document, Fields};
use crate::identity::{Identity, Role};
use crate::ids::{BookingId, EventId, UserId, VendorId};
use crate::timestamp::iso;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Booking workflow status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Sent to the vendor, no answer yet
    Pending,
    /// Vendor agreed
    Accepted,
    /// Vendor declined (terminal)
    Rejected,
    /// Event delivered (terminal)
    Completed,
}

impl BookingStatus {
    /// Every status, in workflow order
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Accepted,
        Self::Rejected,
        Self::Completed,
    ];

    /// Wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    /// No transition leaves a terminal status
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }

    /// The transition table. Staying in the same status is not a transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted | Self::Rejected) | (Self::Accepted, Self::Completed)
        )
    }

    /// Guarded transition.
    ///
    /// # Errors
    ///
    /// [`InvalidTransition`] when `next` is not reachable from `self`.
    pub const fn transition(self, next: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status change the state machine does not allow.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot move booking from {from} to {to}")]
pub struct InvalidTransition {
    /// Current status
    pub from: BookingStatus,
    /// Requested status
    pub to: BookingStatus,
}

/// A booking between a customer and a vendor for one event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Document id
    pub id: BookingId,
    /// Booked vendor
    pub vendor_id: VendorId,
    /// Booking customer
    pub customer_id: UserId,
    /// Event the booking is for
    pub event_id: EventId,
    /// Workflow status
    pub status: BookingStatus,
    /// Agreed amount
    pub amount: f64,
    /// Creation time (canonical ISO)
    #[serde(deserialize_with = "iso::deserialize")]
    pub created_at: String,
    /// Last status or contract change (canonical ISO)
    #[serde(
        default,
        deserialize_with = "iso::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<String>,
    /// Free-text notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Once true, stays true
    #[serde(default)]
    pub contract_signed: bool,
    /// Signed contract document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_url: Option<String>,
}

impl Booking {
    /// Coerce a remote document, failing closed.
    ///
    /// # Errors
    ///
    /// [`CoercionError`] if the body is malformed, a party id is blank or the
    /// amount is negative.
    pub fn from_document(document: &Document) -> Result<Self, CoercionError> {
        let booking: Self = decode("booking", document)?;
        let reason = if booking.vendor_id.is_empty() || booking.customer_id.is_empty() {
            Some("vendorId and customerId are required")
        } else if !booking.amount.is_finite() || booking.amount < 0.0 {
            Some("amount is negative")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(CoercionError::Invalid {
                entity: "booking",
                id: document.id.clone(),
                reason: reason.to_owned(),
            }),
            None => Ok(booking),
        }
    }

    /// Vendors see bookings made with them, customers see their own, admins
    /// see everything.
    #[must_use]
    pub fn is_visible_to(&self, identity: &Identity) -> bool {
        match identity.role {
            Role::Admin => true,
            Role::Vendor => self.vendor_id.as_str() == identity.user_id.as_str(),
            Role::Customer => self.customer_id == identity.user_id,
        }
    }

    /// The persisted body (everything except the id)
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let mut fields = encode(self);
        fields.remove("id");
        fields
    }
}

/// Input for creating a booking.
///
/// `status` and `contract_signed` are accepted so callers can pass whatever
/// their form holds, but they are ignored: a new booking is always `pending`
/// and unsigned.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    /// Vendor to book
    pub vendor_id: VendorId,
    /// Customer booking
    pub customer_id: UserId,
    /// Event the booking is for
    pub event_id: EventId,
    /// Agreed amount
    pub amount: f64,
    /// Free-text notes
    pub notes: Option<String>,
    /// Ignored
    pub status: Option<BookingStatus>,
    /// Ignored
    pub contract_signed: Option<bool>,
}

impl NewBooking {
    /// Check the input.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<(), InvalidInput> {
        require_text("vendorId", self.vendor_id.as_str())?;
        require_text("customerId", self.customer_id.as_str())?;
        require_text("eventId", self.event_id.as_str())?;
        require_amount("amount", self.amount)
    }

    /// Build the record to persist. The id is filled in once the store
    /// assigns one.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] if [`NewBooking::validate`] fails.
    pub fn into_draft(self, now: &str) -> Result<Booking, InvalidInput> {
        self.validate()?;
        Ok(Booking {
            id: BookingId::new(""),
            vendor_id: self.vendor_id,
            customer_id: self.customer_id,
            event_id: self.event_id,
            status: BookingStatus::Pending,
            amount: self.amount,
            created_at: now.to_owned(),
            updated_at: Some(now.to_owned()),
            notes: self.notes,
            contract_signed: false,
            contract_url: None,
        })
    }
}

/// Partial update of a booking.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPatch {
    /// New status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
    /// Change time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Only ever `Some(true)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_signed: Option<bool>,
    /// Signed contract document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_url: Option<String>,
}

impl BookingPatch {
    /// A status change stamped at `now`
    #[must_use]
    pub fn status(status: BookingStatus, now: &str) -> Self {
        Self {
            status: Some(status),
            updated_at: Some(now.to_owned()),
            ..Self::default()
        }
    }

    /// A contract signature stamped at `now`
    #[must_use]
    pub fn signed(contract_url: impl Into<String>, now: &str) -> Self {
        Self {
            contract_signed: Some(true),
            contract_url: Some(contract_url.into()),
            updated_at: Some(now.to_owned()),
            ..Self::default()
        }
    }

    /// Render the wire patch
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        encode(self)
    }
}

impl Entity for Booking {
    type Id = BookingId;
    type Patch = BookingPatch;

    fn id(&self) -> &BookingId {
        &self.id
    }

    fn apply(&mut self, patch: &BookingPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if patch.updated_at.is_some() {
            self.updated_at.clone_from(&patch.updated_at);
        }
        if patch.contract_signed == Some(true) {
            self.contract_signed = true;
        }
        if patch.contract_url.is_some() {
            self.contract_url.clone_from(&patch.contract_url);
        }
    }
}
