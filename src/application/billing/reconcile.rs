//! Reconciliation - Phase two of the subscription commit.
//!
//! Applies provider-confirmed facts to the entitlement store. Both operations are
//! idempotent, so redelivered or duplicated events are harmless.

use serde::{Deserialize, Serialize};

use crate::domain::billing::{BillingError, BillingUser, SubscriptionLink};
use crate::domain::foundation::UserId;

use super::subscription_coordinator::SubscriptionCoordinator;

/// Provider confirmed that `customer_id` holds `subscription_id` on `plan_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileCommand {
    pub subscription_id: String,
    pub customer_id: String,
    /// Only checkout-class events carry an email.
    pub email: Option<String>,
    pub plan_id: String,
}

/// Provider terminated `subscription_id` under `customer_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeCommand {
    pub subscription_id: String,
    pub customer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The entitlement was written.
    Applied { user_id: UserId },
    /// The record already reflected the fact.
    Unchanged,
}

impl ReconcileOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied { .. })
    }
}

fn require(field: &str, value: &str) -> Result<(), BillingError> {
    if value.trim().is_empty() {
        return Err(BillingError::invalid_event(format!("{} is required", field)));
    }
    Ok(())
}

impl SubscriptionCoordinator {
    /// Commits a confirmed subscription to the matching user.
    ///
    /// The user is matched by customer id first, then by email among users whose
    /// customer id is unset or already equal.
    pub async fn reconcile(&self, cmd: ReconcileCommand) -> Result<ReconcileOutcome, BillingError> {
        require("subscription_id", &cmd.subscription_id)?;
        require("customer_id", &cmd.customer_id)?;
        require("plan_id", &cmd.plan_id)?;

        let candidate = self.match_user(&cmd).await?;
        let _guard = self.locks.acquire(&candidate.id).await;

        // Re-read under the lock; the candidate may have changed since the match.
        let user = self.load_user(&candidate.id).await?;
        if !user.accepts_customer(&cmd.customer_id) {
            return Err(BillingError::user_not_found(format!(
                "customer {}",
                cmd.customer_id
            )));
        }

        let link = SubscriptionLink::new(&cmd.subscription_id, &cmd.plan_id);
        if user.customer_id.as_deref() == Some(cmd.customer_id.as_str()) && user.holds(&link) {
            tracing::debug!(
                user_id = %user.id,
                subscription_id = %cmd.subscription_id,
                "Entitlement already reconciled"
            );
            return Ok(ReconcileOutcome::Unchanged);
        }

        self.store
            .set_entitlement(&user.id, Some(&cmd.customer_id), Some(&link))
            .await?;

        tracing::info!(
            user_id = %user.id,
            customer_id = %cmd.customer_id,
            subscription_id = %cmd.subscription_id,
            plan_id = %cmd.plan_id,
            "Entitlement applied"
        );

        Ok(ReconcileOutcome::Applied { user_id: user.id })
    }

    /// Clears the entitlement of the customer's user, if it still tracks the
    /// terminated subscription.
    pub async fn revoke(&self, cmd: RevokeCommand) -> Result<ReconcileOutcome, BillingError> {
        require("subscription_id", &cmd.subscription_id)?;
        require("customer_id", &cmd.customer_id)?;

        let Some(candidate) = self.store.find_user_by_customer_id(&cmd.customer_id).await? else {
            tracing::debug!(
                customer_id = %cmd.customer_id,
                subscription_id = %cmd.subscription_id,
                "No user for terminated subscription"
            );
            return Ok(ReconcileOutcome::Unchanged);
        };

        let _guard = self.locks.acquire(&candidate.id).await;
        let user = self.load_user(&candidate.id).await?;

        if user.subscription_id() != Some(cmd.subscription_id.as_str()) {
            return Ok(ReconcileOutcome::Unchanged);
        }

        self.store.set_entitlement(&user.id, None, None).await?;

        tracing::info!(
            user_id = %user.id,
            subscription_id = %cmd.subscription_id,
            "Entitlement revoked by provider"
        );

        Ok(ReconcileOutcome::Applied { user_id: user.id })
    }

    /// Checks a pushed confirmation against the provider's current snapshot.
    ///
    /// Returns the reason the provider no longer backs `cmd`, or `None` when the
    /// subscription is still active under the same customer. Late and redelivered
    /// events are decided here, not by their own body.
    pub async fn unconfirmed_reason(
        &self,
        cmd: &ReconcileCommand,
    ) -> Result<Option<String>, BillingError> {
        let snapshot = self.gateway.get_subscription(&cmd.subscription_id).await?;

        let reason = match snapshot {
            None => Some("subscription unknown to provider".to_string()),
            Some(s) if s.customer_id != cmd.customer_id => {
                Some(format!("subscription held by customer {}", s.customer_id))
            }
            Some(s) if !s.status.is_active() => Some(format!("provider status {}", s.status)),
            Some(_) => None,
        };
        Ok(reason)
    }

    async fn match_user(&self, cmd: &ReconcileCommand) -> Result<BillingUser, BillingError> {
        if let Some(user) = self.store.find_user_by_customer_id(&cmd.customer_id).await? {
            return Ok(user);
        }

        if let Some(email) = cmd.email.as_deref().filter(|e| !e.is_empty()) {
            let by_email = self
                .store
                .find_user_by_email(email)
                .await?
                .filter(|u| u.accepts_customer(&cmd.customer_id));
            if let Some(user) = by_email {
                return Ok(user);
            }
        }

        tracing::warn!(
            customer_id = %cmd.customer_id,
            subscription_id = %cmd.subscription_id,
            "No user matches confirmed subscription"
        );
        Err(BillingError::user_not_found(format!(
            "customer {}",
            cmd.customer_id
        )))
    }
}
