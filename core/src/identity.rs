//! Caller identity and role.
//!
//! The data layer consumes only `{user id, role}` from whatever authenticates
//! the user. Every role-scoped query is derived from an [`Identity`].

use crate::ids::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Access class of an authenticated user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Plans events, requests quotations, books vendors
    Customer,
    /// Sees every record
    Admin,
    /// Receives bookings and quotation requests
    Vendor,
}

impl Role {
    /// Wire representation of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::Vendor => "vendor",
        }
    }

    /// Whether this role bypasses ownership filters
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role attribute is not one of `customer`, `admin`, `vendor`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            "vendor" => Ok(Self::Vendor),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// The authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable user id from the identity provider
    pub user_id: UserId,
    /// Access class used to scope queries
    pub role: Role,
}

impl Identity {
    /// Creates an identity
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Shorthand for a customer identity
    #[must_use]
    pub fn customer(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Customer)
    }

    /// Shorthand for an admin identity
    #[must_use]
    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Admin)
    }

    /// Shorthand for a vendor identity
    #[must_use]
    pub fn vendor(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Vendor)
    }
}

/// Source of the current caller identity.
///
/// Reads are synchronous; a change of identity is signalled to the stores by
/// the owning session, which then re-fetches everything identity-scoped.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in identity, or `None` when nobody is signed in
    fn current_identity(&self) -> Option<Identity>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_through_strings() {
        for role in [Role::Customer, Role::Admin, Role::Vendor] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!(
            "planner".parse::<Role>(),
            Err(UnknownRole("planner".to_owned()))
        );
    }

    #[test]
    fn only_admin_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Customer.is_admin());
        assert!(!Role::Vendor.is_admin());
    }
}
