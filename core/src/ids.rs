//! Typed identifiers.
//!
//! Document ids are opaque strings assigned by the remote store. Each entity
//! gets its own newtype so a booking id can never be passed where an event id
//! is expected; cross-references between stores are by id only.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a `", stringify!($name), "` from any string-like value")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw id
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the id is empty (never true for a persisted record)
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }

            /// Consume the id, returning the raw string
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Authenticated user id (customer, admin or vendor account)
    UserId
);
string_id!(
    /// Id of a document in the `events` collection
    EventId
);
string_id!(
    /// Id of a document in the `vendors` collection (or a built-in catalog entry)
    VendorId
);
string_id!(
    /// Id of a document in the `quotations` collection
    QuotationId
);
string_id!(
    /// Id of a document in the `bookings` collection
    BookingId
);
string_id!(
    /// Id of a document in the `chatRooms` collection
    RoomId
);
string_id!(
    /// Id of a document in the `messages` collection
    MessageId
);
