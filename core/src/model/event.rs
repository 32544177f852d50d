//! Customer events.

use super::{CoercionError, Entity, InvalidInput, decode, encode, require_amount, require_text};
use crate::document::{Document, Fields};
use crate::identity::Identity;
use crate::ids::{EventId, UserId};
use crate::timestamp::{self, iso};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event as displayed: dates already normalized to canonical ISO strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    /// Document id
    pub id: EventId,
    /// Display title
    pub title: String,
    /// When the event takes place (canonical ISO)
    #[serde(deserialize_with = "iso::deserialize")]
    pub date: String,
    /// Venue / city
    #[serde(default)]
    pub location: String,
    /// Free text
    #[serde(default)]
    pub description: String,
    /// Free-form tag: wedding, birthday, corporate, …
    #[serde(rename = "type", default)]
    pub event_type: String,
    /// Expected guest count
    #[serde(default)]
    pub guests: u32,
    /// Optional budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    /// The one creator of this event
    pub created_by: UserId,
    /// Server-stamped creation time (canonical ISO)
    #[serde(deserialize_with = "iso::deserialize")]
    pub created_at: String,
    /// Cover image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Whether the planning consultancy fee has been paid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultancy_fee_paid: Option<bool>,
    /// Contact phone for the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    /// Contact email for the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    /// Role of the creator at creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,
}

impl EventItem {
    /// Coerce a remote document, failing closed.
    ///
    /// # Errors
    ///
    /// [`CoercionError`] if the body is malformed, a date cannot be
    /// normalized, the creator is blank, or the budget is negative.
    pub fn from_document(document: &Document) -> Result<Self, CoercionError> {
        let event: Self = decode("event", document)?;
        let invalid = |reason: &str| CoercionError::Invalid {
            entity: "event",
            id: document.id.clone(),
            reason: reason.to_owned(),
        };
        if event.created_by.is_empty() {
            return Err(invalid("createdBy is blank"));
        }
        if event
            .budget
            .is_some_and(|budget| !budget.is_finite() || budget < 0.0)
        {
            return Err(invalid("budget is negative"));
        }
        Ok(event)
    }

    /// Non-admins only see events they created; admins see everything.
    #[must_use]
    pub fn is_visible_to(&self, identity: &Identity) -> bool {
        identity.role.is_admin() || self.created_by == identity.user_id
    }

    /// Consultancy fee state for display
    #[must_use]
    pub fn payment_status(&self, fee: f64) -> PaymentStatus {
        PaymentStatus {
            paid: self.consultancy_fee_paid.unwrap_or(false),
            fee,
        }
    }
}

/// Consultancy fee state of one event.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PaymentStatus {
    /// Whether the fee has been paid
    pub paid: bool,
    /// Fee amount
    pub fee: f64,
}

/// Input for creating an event. Creator and timestamps are stamped by the store.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    /// Display title
    pub title: String,
    /// Event date in any accepted timestamp string form
    pub date: String,
    /// Venue / city
    pub location: String,
    /// Free text
    pub description: String,
    /// Free-form tag
    #[serde(rename = "type")]
    pub event_type: String,
    /// Expected guest count
    pub guests: u32,
    /// Optional budget
    pub budget: Option<f64>,
    /// Cover image URL
    pub image: Option<String>,
    /// Contact phone
    pub contact_phone: Option<String>,
    /// Contact email
    pub contact_email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBody {
    title: String,
    date: String,
    location: String,
    description: String,
    #[serde(rename = "type")]
    event_type: String,
    guests: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_email: Option<String>,
    created_by: UserId,
    user_id: UserId,
    user_role: &'static str,
    consultancy_fee_paid: bool,
    created_at: Value,
}

impl NewEvent {
    /// Check required fields and value ranges.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<(), InvalidInput> {
        require_text("title", &self.title)?;
        timestamp::parse_str(&self.date)
            .map_err(|err| InvalidInput::new(format!("date: {err}")))?;
        if let Some(budget) = self.budget {
            require_amount("budget", budget)?;
        }
        Ok(())
    }

    /// Render the persisted body, stamping the creator and creation time.
    ///
    /// The date is stored in canonical ISO form so a later read returns
    /// exactly what was written.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] if [`NewEvent::validate`] fails.
    pub fn into_fields(self, creator: &Identity, created_at: Value) -> Result<Fields, InvalidInput> {
        self.validate()?;
        let date = timestamp::normalize_str(&self.date)
            .map_err(|err| InvalidInput::new(format!("date: {err}")))?;
        Ok(encode(&EventBody {
            title: self.title,
            date,
            location: self.location,
            description: self.description,
            event_type: self.event_type,
            guests: self.guests,
            budget: self.budget,
            image: self.image,
            contact_phone: self.contact_phone,
            contact_email: self.contact_email,
            created_by: creator.user_id.clone(),
            user_id: creator.user_id.clone(),
            user_role: creator.role.as_str(),
            consultancy_fee_paid: false,
            created_at,
        }))
    }
}

/// Partial update of an event. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    /// New title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// New location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New type tag
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// New guest count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guests: Option<u32>,
    /// New budget
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    /// New image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Consultancy fee flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultancy_fee_paid: Option<bool>,
    /// New contact phone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    /// New contact email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
}

impl EventPatch {
    /// Patch that only marks the consultancy fee as paid
    #[must_use]
    pub fn fee_paid() -> Self {
        Self {
            consultancy_fee_paid: Some(true),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate the patch and bring its date into canonical form.
    ///
    /// # Errors
    ///
    /// [`InvalidInput`] if the patch is empty, blanks the title, carries an
    /// unreadable date, or a negative budget.
    pub fn normalized(mut self) -> Result<Self, InvalidInput> {
        if self.is_empty() {
            return Err(InvalidInput::new("update changes nothing"));
        }
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(date) = &self.date {
            let canonical = timestamp::normalize_str(date)
                .map_err(|err| InvalidInput::new(format!("date: {err}")))?;
            self.date = Some(canonical);
        }
        if let Some(budget) = self.budget {
            require_amount("budget", budget)?;
        }
        Ok(self)
    }

    /// Render the wire patch
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        encode(self)
    }
}

impl Entity for EventItem {
    type Id = EventId;
    type Patch = EventPatch;

    fn id(&self) -> &EventId {
        &self.id
    }

    fn apply(&mut self, patch: &EventPatch) {
        let patch = patch.clone();
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(event_type) = patch.event_type {
            self.event_type = event_type;
        }
        if let Some(guests) = patch.guests {
            self.guests = guests;
        }
        if patch.budget.is_some() {
            self.budget = patch.budget;
        }
        if patch.image.is_some() {
            self.image = patch.image;
        }
        if patch.consultancy_fee_paid.is_some() {
            self.consultancy_fee_paid = patch.consultancy_fee_paid;
        }
        if patch.contact_phone.is_some() {
            self.contact_phone = patch.contact_phone;
        }
        if patch.contact_email.is_some() {
            self.contact_email = patch.contact_email;
        }
    }
}
