//! The billing slice of an internal user record.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserId;

/// Link between a user and the provider subscription they are entitled through.
///
/// Subscription and plan ids only ever travel together, so a record can never hold
/// one without the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionLink {
    pub subscription_id: String,
    pub plan_id: String,
}

impl SubscriptionLink {
    pub fn new(subscription_id: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            plan_id: plan_id.into(),
        }
    }
}

/// A user as seen by the billing core.
///
/// The record is owned by user management; this core only reads it and writes the
/// `customer_id` and `subscription` fields through the entitlement store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,

    /// Provider customer id. Assigned on first checkout, never reassigned.
    pub customer_id: Option<String>,

    /// Current entitlement, if any.
    pub subscription: Option<SubscriptionLink>,
}

impl BillingUser {
    /// Creates a user with no billing identity yet.
    pub fn new(id: UserId, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
            phone: None,
            role: "user".to_string(),
            customer_id: None,
            subscription: None,
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_subscription(mut self, link: SubscriptionLink) -> Self {
        self.subscription = Some(link);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.subscription_id.as_str())
    }

    pub fn plan_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.plan_id.as_str())
    }

    /// True when this user already tracks exactly `link`.
    pub fn holds(&self, link: &SubscriptionLink) -> bool {
        self.subscription.as_ref() == Some(link)
    }

    /// True when the user could be (or already is) linked to `customer_id`.
    pub fn accepts_customer(&self, customer_id: &str) -> bool {
        match &self.customer_id {
            None => true,
            Some(existing) => existing == customer_id,
        }
    }

    /// A subscription always belongs to a known customer.
    pub fn entitlement_is_consistent(&self) -> bool {
        self.subscription.is_none() || self.customer_id.is_some()
    }
}
