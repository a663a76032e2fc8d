//! In-memory entitlement store.
//!
//! Deterministic `EntitlementStore` for tests and local development. Enforces the
//! same write guards as the PostgreSQL adapter.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::domain::billing::{BillingUser, SubscriptionLink};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::EntitlementStore;

/// In-memory user records keyed by user id.
///
/// # Example
///
/// ```ignore
/// let store = InMemoryEntitlementStore::new();
/// store.insert_user(BillingUser::new(user_id, "a@x.com", "Ada"));
/// ```
#[derive(Default)]
pub struct InMemoryEntitlementStore {
    users: RwLock<HashMap<UserId, BillingUser>>,
    /// Simulates an unavailable database when set.
    failing: AtomicBool,
}

fn user_not_found(user_id: &UserId) -> DomainError {
    DomainError::new(ErrorCode::NotFound, format!("User {} not found", user_id))
        .with_detail("user_id", user_id.as_str())
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or replaces a user record.
    pub fn insert_user(&self, user: BillingUser) {
        self.write().insert(user.id.clone(), user);
    }

    /// Returns a copy of a stored record.
    pub fn user(&self, user_id: &UserId) -> Option<BillingUser> {
        self.read().get(user_id).cloned()
    }

    /// Returns every stored record, ordered by user id.
    pub fn users(&self) -> Vec<BillingUser> {
        let mut users: Vec<_> = self.read().values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    /// Makes every subsequent call fail with a database error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<UserId, BillingUser>> {
        self.users.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<UserId, BillingUser>> {
        self.users.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::database("in-memory store unavailable"));
        }
        Ok(())
    }

    fn find_by(&self, predicate: impl Fn(&BillingUser) -> bool) -> Option<BillingUser> {
        let mut matches: Vec<_> = self.read().values().filter(|u| predicate(*u)).cloned().collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.into_iter().next()
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<BillingUser>, DomainError> {
        self.check_available()?;
        Ok(self.user(user_id))
    }

    async fn find_user_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<BillingUser>, DomainError> {
        self.check_available()?;
        Ok(self.find_by(|u| u.customer_id.as_deref() == Some(customer_id)))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<BillingUser>, DomainError> {
        self.check_available()?;
        Ok(self.find_by(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn set_customer_id(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        self.check_available()?;
        let mut users = self.write();
        let user = users.get_mut(user_id).ok_or_else(|| user_not_found(user_id))?;

        if !user.accepts_customer(customer_id) {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!("User {} is already linked to another customer", user_id),
            ));
        }

        user.customer_id = Some(customer_id.to_string());
        Ok(())
    }

    async fn set_entitlement(
        &self,
        user_id: &UserId,
        customer_id: Option<&str>,
        subscription: Option<&SubscriptionLink>,
    ) -> Result<(), DomainError> {
        self.check_available()?;
        let mut users = self.write();
        let user = users.get_mut(user_id).ok_or_else(|| user_not_found(user_id))?;

        if let Some(customer_id) = customer_id {
            if !user.accepts_customer(customer_id) {
                return Err(DomainError::new(
                    ErrorCode::Conflict,
                    format!("User {} is already linked to another customer", user_id),
                ));
            }
        }

        let resulting_customer = customer_id
            .map(str::to_string)
            .or_else(|| user.customer_id.clone());

        if subscription.is_some() && resulting_customer.is_none() {
            return Err(DomainError::new(
                ErrorCode::InvariantViolation,
                "Subscription requires a customer id",
            ));
        }

        user.customer_id = resulting_customer;
        user.subscription = subscription.cloned();
        Ok(())
    }
}
