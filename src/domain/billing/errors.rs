//! Billing-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | UserNotFound | 404 |
//! | PlanNotFound | 404 |
//! | SubscriptionNotFound | 404 |
//! | NoActiveSubscription | 409 |
//! | SubscriptionAlreadyActive | 409 |
//! | ProviderUnavailable | 502 |
//! | InvalidEvent | 400 |
//! | Store | 500 |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};

/// Errors surfaced by the subscription lifecycle core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    /// No internal user matches the lookup.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The provider has no such plan.
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    /// The provider does not know the subscription.
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// The user has no subscription to act on.
    #[error("User {0} has no active subscription")]
    NoActiveSubscription(UserId),

    /// The user must cancel before checking out again.
    #[error("User {0} already has an active subscription")]
    SubscriptionAlreadyActive(UserId),

    /// A provider call failed or timed out.
    #[error("Billing provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A pushed event was malformed or could not be verified.
    #[error("Invalid provider event: {0}")]
    InvalidEvent(String),

    /// The entitlement store failed.
    #[error("Entitlement store error: {0}")]
    Store(String),
}

impl BillingError {
    pub fn user_not_found(lookup: impl Into<String>) -> Self {
        BillingError::UserNotFound(lookup.into())
    }

    pub fn plan_not_found(plan_id: impl Into<String>) -> Self {
        BillingError::PlanNotFound(plan_id.into())
    }

    pub fn subscription_not_found(subscription_id: impl Into<String>) -> Self {
        BillingError::SubscriptionNotFound(subscription_id.into())
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        BillingError::ProviderUnavailable(message.into())
    }

    pub fn invalid_event(message: impl Into<String>) -> Self {
        BillingError::InvalidEvent(message.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::UserNotFound(_) => "USER_NOT_FOUND",
            BillingError::PlanNotFound(_) => "PLAN_NOT_FOUND",
            BillingError::SubscriptionNotFound(_) => "SUBSCRIPTION_NOT_FOUND",
            BillingError::NoActiveSubscription(_) => "NO_ACTIVE_SUBSCRIPTION",
            BillingError::SubscriptionAlreadyActive(_) => "SUBSCRIPTION_ALREADY_ACTIVE",
            BillingError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            BillingError::InvalidEvent(_) => "INVALID_EVENT",
            BillingError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::ProviderUnavailable(_) | BillingError::Store(_)
        )
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::NotFound => BillingError::UserNotFound(
                err.details
                    .get("user_id")
                    .cloned()
                    .unwrap_or_else(|| err.message.clone()),
            ),
            _ => BillingError::Store(err.to_string()),
        }
    }
}
