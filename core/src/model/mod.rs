//! Typed entities and their coercion rules.
//!
//! Remote documents are untyped maps. Each entity has exactly one way in:
//! a `from_document` function that either yields a fully-populated value or a
//! [`CoercionError`]. Callers drop (and log) records that fail; nothing
//! downstream ever sees a half-read entity.
//!
//! Writes go the other way through input structs (`NewEvent`, `NewBooking`, …)
//! that validate themselves and render the exact wire body.

use crate::document::{Document, Fields};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub mod booking;
pub mod chat;
pub mod event;
pub mod vendor;

pub use booking::{Booking, BookingPatch, BookingStatus, InvalidTransition, NewBooking};
pub use chat::{ChatRoom, Message, NewMessage, NewRoom, RoomPatch};
pub use event::{EventItem, EventPatch, NewEvent, PaymentStatus};
pub use vendor::{ContactInfo, PriceRange, QuotationDetails, QuotationRequest, QuotationStatus, Vendor};

/// Why a remote document could not be read as an entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    /// The body does not have the entity's shape (missing or mistyped fields,
    /// bad timestamps)
    #[error("malformed {entity} document {id}: {reason}")]
    Malformed {
        /// Entity name
        entity: &'static str,
        /// Document id
        id: String,
        /// Deserializer message
        reason: String,
    },

    /// Shape is fine but a value breaks an invariant
    #[error("invalid {entity} document {id}: {reason}")]
    Invalid {
        /// Entity name
        entity: &'static str,
        /// Document id
        id: String,
        /// Which invariant failed
        reason: String,
    },
}

/// Input rejected before it reached the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidInput(pub String);

impl InvalidInput {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A cached entity that can be addressed by id and patched in place.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Typed id
    type Id: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static;

    /// Partial update applied after a successful remote write
    type Patch: Clone + std::fmt::Debug + Send + Sync + 'static;

    /// The entity's id
    fn id(&self) -> &Self::Id;

    /// Merge a patch into the cached value
    fn apply(&mut self, patch: &Self::Patch);
}

/// Deserialize a document body into `T`, exposing the document id as `"id"`.
pub(crate) fn decode<T: DeserializeOwned>(
    entity: &'static str,
    document: &Document,
) -> Result<T, CoercionError> {
    let mut fields = document.fields.clone();
    fields.insert("id".to_owned(), Value::String(document.id.clone()));
    serde_json::from_value(Value::Object(fields)).map_err(|err| CoercionError::Malformed {
        entity,
        id: document.id.clone(),
        reason: err.to_string(),
    })
}

/// Serialize an input struct into a document body.
pub(crate) fn encode<T: Serialize>(value: &T) -> Fields {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => fields,
        _ => Fields::new(),
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), InvalidInput> {
    if value.trim().is_empty() {
        Err(InvalidInput::new(format!("{field} is required")))
    } else {
        Ok(())
    }
}

pub(crate) fn require_amount(field: &str, value: f64) -> Result<(), InvalidInput> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InvalidInput::new(format!(
            "{field} must be a non-negative number"
        )))
    }
}
