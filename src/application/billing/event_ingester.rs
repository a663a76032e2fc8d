//! EventIngester - Entry point for provider-pushed events.
//!
//! Verifies the signature, normalizes the event into a reconcile or revoke
//! command, and hands it to the coordinator. Event types the core does not act
//! on are acknowledged as ignored so the provider stops redelivering them.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::billing::{BillingError, SubscriptionStatus};
use crate::ports::{VerifiedEvent, WebhookVerifier};

use super::reconcile::{ReconcileCommand, ReconcileOutcome, RevokeCommand};
use super::subscription_coordinator::SubscriptionCoordinator;

/// Event types the ingester acts on.
pub mod event_types {
    pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
    pub const SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
    pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
    pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
}

/// What an ingested event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Reconciled(ReconcileOutcome),
    Revoked(ReconcileOutcome),
    Ignored { event_type: String, reason: String },
}

impl IngestOutcome {
    /// Short label for the webhook response body.
    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Reconciled(ReconcileOutcome::Applied { .. }) => "reconciled",
            IngestOutcome::Revoked(ReconcileOutcome::Applied { .. }) => "revoked",
            IngestOutcome::Reconciled(ReconcileOutcome::Unchanged)
            | IngestOutcome::Revoked(ReconcileOutcome::Unchanged) => "unchanged",
            IngestOutcome::Ignored { .. } => "ignored",
        }
    }
}

/// An event reduced to the fact the core acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProviderFact {
    Confirmed(ReconcileCommand),
    Terminated(RevokeCommand),
    Ignored(String),
}

// ════════════════════════════════════════════════════════════════════════════════
// Event object shapes
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    mode: Option<String>,
    payment_status: Option<String>,
    subscription: Option<String>,
    customer: Option<String>,
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: String,
    status: SubscriptionStatus,
    items: ItemList,
}

#[derive(Debug, Deserialize)]
struct ItemList {
    data: Vec<ItemObject>,
}

#[derive(Debug, Deserialize)]
struct ItemObject {
    plan: Option<IdRef>,
    price: Option<IdRef>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

fn parse_object<T: DeserializeOwned>(event: &VerifiedEvent) -> Result<T, BillingError> {
    T::deserialize(&event.object).map_err(|e| {
        BillingError::invalid_event(format!("{} object: {}", event.event_type, e))
    })
}

fn required(field: &str, value: Option<String>) -> Result<String, BillingError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BillingError::invalid_event(format!("missing {}", field)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Normalization
// ════════════════════════════════════════════════════════════════════════════════

fn normalize(event: &VerifiedEvent) -> Result<ProviderFact, BillingError> {
    match event.event_type.as_str() {
        event_types::CHECKOUT_SESSION_COMPLETED => normalize_checkout(event),
        event_types::SUBSCRIPTION_CREATED | event_types::SUBSCRIPTION_UPDATED => {
            normalize_subscription(event)
        }
        event_types::SUBSCRIPTION_DELETED => {
            let subscription: SubscriptionObject = parse_object(event)?;
            Ok(ProviderFact::Terminated(RevokeCommand {
                subscription_id: subscription.id,
                customer_id: subscription.customer,
            }))
        }
        _ => Ok(ProviderFact::Ignored("unhandled event type".to_string())),
    }
}

fn normalize_checkout(event: &VerifiedEvent) -> Result<ProviderFact, BillingError> {
    let mut session: CheckoutSessionObject = parse_object(event)?;

    if session.mode.as_deref() != Some("subscription") {
        return Ok(ProviderFact::Ignored("not a subscription checkout".to_string()));
    }

    match session.payment_status.as_deref() {
        Some("paid") | Some("no_payment_required") => {}
        other => {
            return Ok(ProviderFact::Ignored(format!(
                "payment status {}",
                other.unwrap_or("unknown")
            )))
        }
    }

    let email = session
        .customer_details
        .and_then(|d| d.email)
        .or(session.customer_email);

    Ok(ProviderFact::Confirmed(ReconcileCommand {
        subscription_id: required("subscription", session.subscription)?,
        customer_id: required("customer", session.customer)?,
        email,
        plan_id: required("metadata.plan_id", session.metadata.remove("plan_id"))?,
    }))
}

fn normalize_subscription(event: &VerifiedEvent) -> Result<ProviderFact, BillingError> {
    let subscription: SubscriptionObject = parse_object(event)?;

    if !subscription.status.is_active() {
        return Ok(ProviderFact::Ignored(format!(
            "subscription status {}",
            subscription.status
        )));
    }

    let plan_id = subscription
        .items
        .data
        .into_iter()
        .next()
        .and_then(|item| item.plan.or(item.price))
        .map(|r| r.id);

    Ok(ProviderFact::Confirmed(ReconcileCommand {
        subscription_id: required("id", Some(subscription.id))?,
        customer_id: required("customer", Some(subscription.customer))?,
        email: None,
        plan_id: required("items[0].plan", plan_id)?,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Ingester
// ════════════════════════════════════════════════════════════════════════════════

/// Webhook entry point.
pub struct EventIngester {
    verifier: Arc<dyn WebhookVerifier>,
    coordinator: Arc<SubscriptionCoordinator>,
}

impl EventIngester {
    pub fn new(verifier: Arc<dyn WebhookVerifier>, coordinator: Arc<SubscriptionCoordinator>) -> Self {
        Self {
            verifier,
            coordinator,
        }
    }

    /// Verifies and applies one pushed event.
    pub async fn ingest(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<IngestOutcome, BillingError> {
        // 1. Nothing unverified reaches reconcile
        let event = self.verifier.verify(payload, signature)?;

        // 2. Reduce to a fact
        let fact = normalize(&event).map_err(|e| {
            tracing::warn!(event_id = %event.id, event_type = %event.event_type, error = %e, "Malformed provider event");
            e
        })?;

        // 3. Apply
        match fact {
            ProviderFact::Confirmed(cmd) => {
                // The provider's current snapshot wins over the event body
                if let Some(reason) = self.coordinator.unconfirmed_reason(&cmd).await? {
                    tracing::info!(
                        event_id = %event.id,
                        subscription_id = %cmd.subscription_id,
                        reason = %reason,
                        "Stale confirmation dropped"
                    );
                    return Ok(ignored(event, reason));
                }
                let outcome = self.coordinator.reconcile(cmd).await?;
                Ok(IngestOutcome::Reconciled(outcome))
            }
            ProviderFact::Terminated(cmd) => {
                let outcome = self.coordinator.revoke(cmd).await?;
                Ok(IngestOutcome::Revoked(outcome))
            }
            ProviderFact::Ignored(reason) => {
                tracing::debug!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    reason = %reason,
                    "Provider event ignored"
                );
                Ok(ignored(event, reason))
            }
        }
    }
}

fn ignored(event: VerifiedEvent, reason: String) -> IngestOutcome {
    IngestOutcome::Ignored {
        event_type: event.event_type,
        reason,
    }
}
