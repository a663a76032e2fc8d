//! Provider gateway port for the external billing provider.
//!
//! A thin facade over the provider API: customers, plans, checkout sessions, and
//! subscriptions. The application layer never talks HTTP to the provider directly.
//!
//! # Design
//!
//! - **No caching**: every call reaches the provider
//! - **Minor units / epoch seconds**: amounts and timestamps are passed through as
//!   the provider reports them
//! - **Absence is not an error**: single-resource lookups return `Ok(None)`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::billing::{BillingError, Plan, SubscriptionSnapshot};
use crate::domain::foundation::UserId;

/// Port for the subscription-billing provider.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Create a customer keyed by the user's email.
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, ProviderError>;

    /// Get customer by provider ID.
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, ProviderError>;

    /// List every plan the provider offers, in provider order.
    async fn list_plans(&self) -> Result<Vec<Plan>, ProviderError>;

    /// Get a single plan by provider ID.
    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>, ProviderError>;

    /// Create a hosted checkout session for one unit of one plan.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, ProviderError>;

    /// List subscriptions in every status, optionally for one customer.
    async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
    ) -> Result<Vec<SubscriptionSnapshot>, ProviderError>;

    /// Get subscription by provider ID.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionSnapshot>, ProviderError>;

    /// Cancel a subscription immediately.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, ProviderError>;
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Internal user ID (stored as metadata).
    pub user_id: UserId,

    /// Customer email address.
    pub email: String,

    /// Customer name (optional).
    pub name: Option<String>,
}

/// Customer in the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Provider's customer ID.
    pub id: String,

    /// Customer email, when the provider has one on file.
    pub email: Option<String>,

    /// When the customer was created (provider timestamp).
    pub created_at: i64,
}

/// Request to create a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Internal user ID (carried as session metadata).
    pub user_id: UserId,

    /// Provider customer the session bills.
    pub customer_id: String,

    /// Plan (price) to subscribe to.
    pub plan_id: String,

    /// URL to redirect after successful checkout.
    pub success_url: String,

    /// URL to redirect after canceled checkout.
    pub cancel_url: String,
}

/// Checkout session for payment completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID.
    pub id: String,

    /// URL for customer to complete checkout.
    pub url: String,
}

/// Filter for subscription listings. Status is always "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub customer_id: Option<String>,
}

impl SubscriptionFilter {
    /// Every subscription the provider knows.
    pub fn all() -> Self {
        Self::default()
    }

    /// Subscriptions of one customer.
    pub fn for_customer(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: Some(customer_id.into()),
        }
    }
}

/// Errors from provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Error code for categorization.
    pub code: ProviderErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(ProviderErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ProviderErrorCode::NotFound
    }

    /// Converts to a billing error, naming the missing resource when the provider
    /// reports `NotFound`.
    pub fn into_billing(self, on_not_found: impl FnOnce() -> BillingError) -> BillingError {
        if self.is_not_found() {
            on_not_found()
        } else {
            BillingError::ProviderUnavailable(self.to_string())
        }
    }
}

/// Without a resource to name, every provider failure is an availability failure.
impl From<ProviderError> for BillingError {
    fn from(err: ProviderError) -> Self {
        BillingError::ProviderUnavailable(err.to_string())
    }
}

/// Provider error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    /// Network connectivity issue or timeout.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Provider rejected the request parameters.
    InvalidRequest,

    /// Provider answered with a body we could not read.
    InvalidResponse,

    /// Provider API error.
    ProviderError,
}

impl ProviderErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorCode::NetworkError | ProviderErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderErrorCode::NetworkError => "network_error",
            ProviderErrorCode::AuthenticationError => "authentication_error",
            ProviderErrorCode::NotFound => "not_found",
            ProviderErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            ProviderErrorCode::InvalidRequest => "invalid_request",
            ProviderErrorCode::InvalidResponse => "invalid_response",
            ProviderErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety test
    #[test]
    fn provider_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn ProviderGateway) {}
    }

    #[test]
    fn provider_error_retryable() {
        assert!(ProviderError::network("timeout").retryable);
        assert!(ProviderErrorCode::RateLimitExceeded.is_retryable());

        assert!(!ProviderError::not_found("Plan").retryable);
        assert!(!ProviderErrorCode::AuthenticationError.is_retryable());
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::not_found("Subscription");
        assert_eq!(err.to_string(), "not_found: Subscription not found");
    }

    #[test]
    fn not_found_maps_to_named_resource() {
        let err = ProviderError::not_found("Plan")
            .into_billing(|| BillingError::plan_not_found("plan_9"));
        assert_eq!(err, BillingError::PlanNotFound("plan_9".to_string()));
    }

    #[test]
    fn other_codes_map_to_provider_unavailable() {
        let err = ProviderError::network("connection reset")
            .into_billing(|| BillingError::plan_not_found("plan_9"));
        assert!(matches!(err, BillingError::ProviderUnavailable(_)));

        let err: BillingError = ProviderError::authentication("bad key").into();
        assert_eq!(err.code(), "PROVIDER_UNAVAILABLE");
    }

    #[test]
    fn filter_constructors() {
        assert_eq!(SubscriptionFilter::all().customer_id, None);
        assert_eq!(
            SubscriptionFilter::for_customer("cus_1").customer_id.as_deref(),
            Some("cus_1")
        );
    }
}
