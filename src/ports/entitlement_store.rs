//! Entitlement store port.
//!
//! The billing fields of the internal user record: provider customer id and the
//! subscription link. User management owns the rest of the record; this port only
//! reads users and writes those two fields.
//!
//! # Invariants
//!
//! Implementations must refuse writes that would break them:
//!
//! - A customer id, once set, is never reassigned to a different value
//! - A subscription link is never stored without a customer id

use async_trait::async_trait;

use crate::domain::billing::{BillingUser, SubscriptionLink};
use crate::domain::foundation::{DomainError, UserId};

/// Store port for user entitlements.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Find a user by internal ID.
    ///
    /// Returns `None` if not found.
    async fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<BillingUser>, DomainError>;

    /// Find the user linked to a provider customer.
    async fn find_user_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<BillingUser>, DomainError>;

    /// Find a user by email address.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<BillingUser>, DomainError>;

    /// Record the user's provider customer id.
    ///
    /// Setting the value the user already holds is a no-op.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user doesn't exist
    /// - `Conflict` if a different customer id is already set
    /// - `DatabaseError` on persistence failure
    async fn set_customer_id(&self, user_id: &UserId, customer_id: &str)
        -> Result<(), DomainError>;

    /// Replace the user's entitlement.
    ///
    /// `customer_id = None` keeps whatever customer id is stored.
    /// `subscription = None` clears the subscription link.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user doesn't exist
    /// - `Conflict` if `customer_id` differs from an already-set value
    /// - `InvariantViolation` if a subscription would be stored without a customer
    /// - `DatabaseError` on persistence failure
    async fn set_entitlement(
        &self,
        user_id: &UserId,
        customer_id: Option<&str>,
        subscription: Option<&SubscriptionLink>,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entitlement_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn EntitlementStore) {}
    }
}
