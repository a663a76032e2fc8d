//! HTTP DTOs for subscription and webhook endpoints.
//!
//! Boundary types between the JSON API and the application layer.

use serde::{Deserialize, Serialize};

use crate::application::billing::{CancelOutcome, CheckoutRedirect, IngestOutcome};
use crate::domain::billing::{
    CatalogPlan, PlanLine, SubscriberView, SubscriptionDetail, SubscriptionSummary,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a subscription checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub plan_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// A purchasable plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub id: String,
    pub display_price: String,
    pub label: String,
    pub currency: String,
    /// Minor currency units.
    pub amount: i64,
    pub interval: String,
}

impl From<CatalogPlan> for PlanResponse {
    fn from(plan: CatalogPlan) -> Self {
        Self {
            id: plan.id,
            display_price: plan.display_price,
            label: plan.label,
            currency: plan.currency,
            amount: plan.amount,
            interval: plan.interval.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanListResponse {
    pub plans: Vec<PlanResponse>,
}

/// Where to send the user to finish checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
}

impl From<CheckoutRedirect> for CheckoutResponse {
    fn from(redirect: CheckoutRedirect) -> Self {
        Self {
            url: redirect.url,
            session_id: redirect.session_id,
        }
    }
}

/// Returned with 202 when the entitlement is cleared but the provider cancel failed.
#[derive(Debug, Clone, Serialize)]
pub struct CancelPendingResponse {
    pub subscription_id: String,
    pub reason: String,
}

impl CancelPendingResponse {
    /// `None` when the provider confirmed the cancel.
    pub fn from_outcome(outcome: CancelOutcome) -> Option<Self> {
        match outcome {
            CancelOutcome::ProviderCancelPending {
                subscription_id,
                reason,
            } => Some(Self {
                subscription_id,
                reason,
            }),
            CancelOutcome::Cancelled { .. } => None,
        }
    }
}

/// One subscription with day-precision period dates.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetailResponse {
    pub id: String,
    /// YYYY-MM-DD
    pub current_period_start: String,
    /// YYYY-MM-DD
    pub current_period_end: String,
    pub status: String,
    pub latest_invoice: Option<String>,
    pub customer_id: String,
}

impl From<SubscriptionDetail> for SubscriptionDetailResponse {
    fn from(detail: SubscriptionDetail) -> Self {
        Self {
            id: detail.id,
            current_period_start: detail.current_period_start.format("%Y-%m-%d").to_string(),
            current_period_end: detail.current_period_end.format("%Y-%m-%d").to_string(),
            status: detail.status.to_string(),
            latest_invoice: detail.latest_invoice,
            customer_id: detail.customer_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<SubscriptionDetailResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanLineResponse {
    pub interval: String,
    pub currency: String,
    pub price: String,
}

impl From<PlanLine> for PlanLineResponse {
    fn from(line: PlanLine) -> Self {
        Self {
            interval: line.interval.to_string(),
            currency: line.currency,
            price: line.price,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriberResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
}

impl From<SubscriberView> for SubscriberResponse {
    fn from(view: SubscriberView) -> Self {
        Self {
            id: view.id.to_string(),
            name: view.name,
            email: view.email,
            phone: view.phone,
            role: view.role,
        }
    }
}

/// Admin audit row.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionSummaryResponse {
    pub id: String,
    /// ISO 8601
    pub created_at: String,
    /// ISO 8601
    pub current_period_start: String,
    /// ISO 8601
    pub current_period_end: String,
    pub status: String,
    pub plan: Vec<PlanLineResponse>,
    pub user: SubscriberResponse,
}

impl From<SubscriptionSummary> for SubscriptionSummaryResponse {
    fn from(summary: SubscriptionSummary) -> Self {
        Self {
            id: summary.id,
            created_at: summary.created_at.as_datetime().to_rfc3339(),
            current_period_start: summary.current_period_start.as_datetime().to_rfc3339(),
            current_period_end: summary.current_period_end.as_datetime().to_rfc3339(),
            status: summary.status.to_string(),
            plan: summary.plan.into_iter().map(PlanLineResponse::from).collect(),
            user: SubscriberResponse::from(summary.user),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionAuditResponse {
    pub subscriptions: Vec<SubscriptionSummaryResponse>,
}

/// Webhook acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub outcome: String,
}

impl From<&IngestOutcome> for WebhookResponse {
    fn from(outcome: &IngestOutcome) -> Self {
        Self {
            outcome: outcome.label().to_string(),
        }
    }
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
