//! SubscriptionCoordinator - Checkout, cancellation and subscription queries.
//!
//! Checkout is phase one of a two-phase commit: it records the customer and hands
//! back a provider-hosted checkout URL, but the entitlement itself is only written
//! when the provider confirms (see `reconcile`). Cancel is the reverse: the local
//! entitlement is cleared before the provider is asked to cancel.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;

use crate::domain::billing::{
    BillingError, BillingUser, SubscriptionDetail, SubscriptionStatus, SubscriptionSummary,
    SummaryPricing,
};
use crate::domain::foundation::UserId;
use crate::ports::{
    CreateCheckoutRequest, CreateCustomerRequest, EntitlementStore, ProviderGateway,
    SubscriptionFilter,
};

use super::plan_catalog::PlanCatalog;
use super::user_locks::UserLocks;

/// Deployment-level settings for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Where the provider sends the user after a completed checkout.
    pub success_url: String,
    /// Where the provider sends the user after an abandoned checkout.
    pub cancel_url: String,
    pub summary_pricing: SummaryPricing,
}

/// Result of starting a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRedirect {
    pub url: String,
    pub session_id: String,
}

/// Result of a cancellation that cleared the local entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The provider confirmed the cancel.
    Cancelled {
        subscription_id: String,
        provider_status: SubscriptionStatus,
    },

    /// The local entitlement is cleared but the provider cancel failed.
    /// The subscription may still be live at the provider.
    ProviderCancelPending {
        subscription_id: String,
        reason: String,
    },
}

impl CancelOutcome {
    pub fn subscription_id(&self) -> &str {
        match self {
            CancelOutcome::Cancelled { subscription_id, .. }
            | CancelOutcome::ProviderCancelPending { subscription_id, .. } => subscription_id,
        }
    }
}

/// Coordinates the entitlement store with the provider.
pub struct SubscriptionCoordinator {
    pub(super) store: Arc<dyn EntitlementStore>,
    pub(super) gateway: Arc<dyn ProviderGateway>,
    pub(super) catalog: PlanCatalog,
    pub(super) locks: Arc<UserLocks>,
    pub(super) settings: CoordinatorSettings,
}

impl SubscriptionCoordinator {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        gateway: Arc<dyn ProviderGateway>,
        catalog: PlanCatalog,
        locks: Arc<UserLocks>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            catalog,
            locks,
            settings,
        }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub(super) async fn load_user(&self, user_id: &UserId) -> Result<BillingUser, BillingError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| BillingError::user_not_found(user_id.as_str()))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Commands
    // ════════════════════════════════════════════════════════════════════════════

    /// Starts a checkout for `plan_id`.
    ///
    /// The subscription and plan are not written here; only the customer id is.
    pub async fn checkout_subscription(
        &self,
        plan_id: &str,
        user_id: &UserId,
    ) -> Result<CheckoutRedirect, BillingError> {
        let _guard = self.locks.acquire(user_id).await;

        // 1. User must exist
        let user = self.load_user(user_id).await?;

        // 2. Plan must exist at the provider
        let plan = self.catalog.get_plan(plan_id).await?;

        // 3. One subscription per user
        if user.subscription.is_some() {
            return Err(BillingError::SubscriptionAlreadyActive(user.id));
        }

        // 4. Customer is persisted before the session exists
        let customer_id = self.ensure_customer(&user).await?;

        // 5. Create the provider-hosted session
        let session = self
            .gateway
            .create_checkout_session(CreateCheckoutRequest {
                user_id: user.id.clone(),
                customer_id: customer_id.clone(),
                plan_id: plan.id.clone(),
                success_url: self.settings.success_url.clone(),
                cancel_url: self.settings.cancel_url.clone(),
            })
            .await?;

        tracing::info!(
            user_id = %user.id,
            customer_id = %customer_id,
            plan_id = %plan.id,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CheckoutRedirect {
            url: session.url,
            session_id: session.id,
        })
    }

    /// Returns the user's provider customer id, creating and persisting one on
    /// first use. No remote call is made when the id is already present.
    pub async fn ensure_customer(&self, user: &BillingUser) -> Result<String, BillingError> {
        if let Some(customer_id) = &user.customer_id {
            return Ok(customer_id.clone());
        }

        let customer = self
            .gateway
            .create_customer(CreateCustomerRequest {
                user_id: user.id.clone(),
                email: user.email.clone(),
                name: Some(user.name.clone()).filter(|n| !n.is_empty()),
            })
            .await?;

        self.store.set_customer_id(&user.id, &customer.id).await?;

        tracing::info!(
            user_id = %user.id,
            customer_id = %customer.id,
            "Provider customer created"
        );

        Ok(customer.id)
    }

    /// Cancels the user's subscription.
    ///
    /// The local entitlement is cleared before the remote cancel. A failed remote
    /// cancel is reported as `ProviderCancelPending`, not as an error.
    pub async fn cancel_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<CancelOutcome, BillingError> {
        let _guard = self.locks.acquire(user_id).await;

        // 1. User must hold a subscription; no remote call otherwise
        let user = self.load_user(user_id).await?;
        let link = user
            .subscription
            .clone()
            .ok_or_else(|| BillingError::NoActiveSubscription(user.id.clone()))?;

        // 2. The provider must know the subscription
        let subscriptions = self
            .gateway
            .list_subscriptions(SubscriptionFilter::all())
            .await?;
        if !subscriptions.iter().any(|s| s.id == link.subscription_id) {
            return Err(BillingError::subscription_not_found(&link.subscription_id));
        }

        // 3. Clear locally, keeping the customer
        self.store.set_entitlement(&user.id, None, None).await?;

        tracing::info!(
            user_id = %user.id,
            subscription_id = %link.subscription_id,
            "Entitlement cleared"
        );

        // 4. Remote cancel
        match self.gateway.cancel_subscription(&link.subscription_id).await {
            Ok(snapshot) => Ok(CancelOutcome::Cancelled {
                subscription_id: link.subscription_id,
                provider_status: snapshot.status,
            }),
            Err(e) => {
                tracing::warn!(
                    user_id = %user.id,
                    subscription_id = %link.subscription_id,
                    error = %e,
                    "Provider cancel failed after local clear; subscription needs manual reconciliation"
                );
                Ok(CancelOutcome::ProviderCancelPending {
                    subscription_id: link.subscription_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Queries
    // ════════════════════════════════════════════════════════════════════════════

    /// Audit listing of every provider subscription with a known owner.
    pub async fn list_all_subscriptions(&self) -> Result<Vec<SubscriptionSummary>, BillingError> {
        let subscriptions = self
            .gateway
            .list_subscriptions(SubscriptionFilter::all())
            .await?;

        let owners = try_join_all(
            subscriptions
                .iter()
                .map(|s| self.store.find_user_by_customer_id(&s.customer_id)),
        )
        .await?;

        let summaries: Vec<SubscriptionSummary> = subscriptions
            .iter()
            .zip(owners)
            .filter_map(|(snapshot, owner)| {
                owner.map(|user| {
                    SubscriptionSummary::build(snapshot, &user, &self.settings.summary_pricing)
                })
            })
            .collect();

        tracing::debug!(
            provider_total = subscriptions.len(),
            listed = summaries.len(),
            "Subscriptions listed"
        );

        Ok(summaries)
    }

    pub async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionDetail, BillingError> {
        let subscriptions = self
            .gateway
            .list_subscriptions(SubscriptionFilter::all())
            .await?;

        subscriptions
            .iter()
            .find(|s| s.id == subscription_id)
            .map(SubscriptionDetail::from)
            .ok_or_else(|| BillingError::subscription_not_found(subscription_id))
    }

    /// One subscription, visible only when it sits under the user's customer.
    ///
    /// Someone else's subscription reads as `SubscriptionNotFound`.
    pub async fn get_user_subscription(
        &self,
        user_id: &UserId,
        subscription_id: &str,
    ) -> Result<SubscriptionDetail, BillingError> {
        let user = self.load_user(user_id).await?;
        let detail = self.get_subscription(subscription_id).await?;

        if user.customer_id.as_deref() != Some(detail.customer_id.as_str()) {
            tracing::warn!(
                user_id = %user_id,
                subscription_id = %subscription_id,
                "Subscription read outside caller's customer"
            );
            return Err(BillingError::subscription_not_found(subscription_id));
        }

        Ok(detail)
    }

    /// Subscriptions under the user's customer. Empty for a user who never checked out.
    pub async fn list_user_subscriptions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SubscriptionDetail>, BillingError> {
        let user = self.load_user(user_id).await?;

        let Some(customer_id) = user.customer_id else {
            return Ok(Vec::new());
        };

        let subscriptions = self
            .gateway
            .list_subscriptions(SubscriptionFilter::for_customer(customer_id))
            .await?;

        Ok(subscriptions.iter().map(SubscriptionDetail::from).collect())
    }
}
