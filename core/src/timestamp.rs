//! Timestamp normalization.
//!
//! Historical documents carry dates in two shapes:
//!
//! - the remote store's opaque timestamp, `{"seconds": i64, "nanoseconds": u32}`
//! - plain strings written by clients (RFC 3339, `YYYY-MM-DDTHH:MM[:SS]`, or
//!   `YYYY-MM-DD`)
//!
//! Both are accepted on read and normalized to one canonical ISO string
//! (`2025-01-01T00:00:00.000Z`), which is what every model exposes and what
//! comparisons run against. Anything else is rejected so the record can be
//! dropped instead of displayed with a broken date.
//!
//! Writes that must be stamped by the server use [`server_timestamp`], a
//! sentinel the document store replaces with its own clock on commit.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field name of the server-timestamp sentinel object.
pub const SERVER_TIMESTAMP_FIELD: &str = "$serverTimestamp";

/// Errors from timestamp coercion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// The value has neither the opaque timestamp shape nor a string form
    #[error("unsupported timestamp value: {0}")]
    Unsupported(String),

    /// A string that matches none of the accepted formats
    #[error("unparseable timestamp string: {0:?}")]
    Unparseable(String),

    /// Seconds/nanoseconds outside the representable range
    #[error("timestamp out of range")]
    OutOfRange,

    /// A server-timestamp sentinel that was never resolved by the store
    #[error("unresolved server timestamp")]
    Unresolved,
}

/// The sentinel a document store replaces with its commit time.
#[must_use]
pub fn server_timestamp() -> Value {
    let mut sentinel = Map::new();
    sentinel.insert(SERVER_TIMESTAMP_FIELD.to_owned(), Value::Bool(true));
    Value::Object(sentinel)
}

/// Whether `value` is the [`server_timestamp`] sentinel.
#[must_use]
pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|object| object.get(SERVER_TIMESTAMP_FIELD))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Encode an instant in the store's opaque timestamp shape.
#[must_use]
pub fn to_wire(instant: DateTime<Utc>) -> Value {
    let mut object = Map::new();
    object.insert("seconds".to_owned(), Value::from(instant.timestamp()));
    object.insert(
        "nanoseconds".to_owned(),
        Value::from(instant.timestamp_subsec_nanos()),
    );
    Value::Object(object)
}

/// Canonical ISO rendering, millisecond precision, `Z` suffix.
#[must_use]
pub fn to_iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse either timestamp shape into an instant.
///
/// # Errors
///
/// Returns [`TimestampError`] when the value is not a recognizable timestamp.
pub fn parse(value: &Value) -> Result<DateTime<Utc>, TimestampError> {
    match value {
        Value::String(text) => parse_str(text),
        Value::Object(object) if object.contains_key(SERVER_TIMESTAMP_FIELD) => {
            Err(TimestampError::Unresolved)
        }
        Value::Object(object) => {
            let seconds = object
                .get("seconds")
                .and_then(Value::as_i64)
                .ok_or_else(|| TimestampError::Unsupported(value.to_string()))?;
            let nanos = object
                .get("nanoseconds")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let nanos = u32::try_from(nanos).map_err(|_| TimestampError::OutOfRange)?;
            Utc.timestamp_opt(seconds, nanos)
                .single()
                .ok_or(TimestampError::OutOfRange)
        }
        other => Err(TimestampError::Unsupported(other.to_string())),
    }
}

/// Parse a client-written date string.
///
/// Accepted, in order: RFC 3339 with any offset, a naive date-time with or
/// without seconds (read as UTC), a bare calendar date (midnight UTC).
///
/// # Errors
///
/// Returns [`TimestampError::Unparseable`] when no format matches.
pub fn parse_str(text: &str) -> Result<DateTime<Utc>, TimestampError> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimestampError::Unparseable(text.to_owned()))
}

/// Normalize either timestamp shape to the canonical ISO string.
///
/// # Errors
///
/// Returns [`TimestampError`] when the value cannot be read as a timestamp.
pub fn normalize(value: &Value) -> Result<String, TimestampError> {
    parse(value).map(to_iso)
}

/// Normalize a client-written string to the canonical ISO string.
///
/// # Errors
///
/// Returns [`TimestampError::Unparseable`] when no format matches.
pub fn normalize_str(text: &str) -> Result<String, TimestampError> {
    parse_str(text).map(to_iso)
}

/// Serde adapters for model fields that hold a normalized timestamp.
pub mod iso {
    use super::{Deserialize, Deserializer, Value, normalize};

    /// Deserialize a required timestamp field into its canonical ISO string.
    ///
    /// # Errors
    ///
    /// Fails when the field holds anything [`normalize`] rejects.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        normalize(&value).map_err(serde::de::Error::custom)
    }

    /// Deserialize an optional timestamp field (`null` and absent are `None`).
    ///
    /// # Errors
    ///
    /// Fails when the field is present, non-null, and rejected by [`normalize`].
    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => normalize(&value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
