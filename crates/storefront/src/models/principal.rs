//! The authenticated caller.

use serde::Serialize;

use edubook_core::{Role, UserId};

/// A verified identity attached to a request.
///
/// Produced by bearer-token verification; everything downstream trusts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    /// A regular customer.
    #[must_use]
    pub const fn user(id: UserId) -> Self {
        Self {
            id,
            role: Role::User,
        }
    }

    /// An administrator.
    #[must_use]
    pub const fn admin(id: UserId) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// The same identity acting as a customer, for "my orders" views.
    #[must_use]
    pub const fn as_customer(&self) -> Self {
        Self::user(self.id)
    }
}
