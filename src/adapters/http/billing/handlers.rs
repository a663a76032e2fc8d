//! HTTP handlers for subscription endpoints.
//!
//! These handlers connect Axum routes to the billing application services.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Json, Path, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::billing::{EventIngester, SubscriptionCoordinator};
use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;

use super::dto::{
    CancelPendingResponse, CheckoutRequest, CheckoutResponse, ErrorResponse, PlanListResponse,
    PlanResponse, SubscriptionAuditResponse, SubscriptionDetailResponse,
    SubscriptionListResponse, SubscriptionSummaryResponse, WebhookResponse,
};

/// Header carrying the caller's user id, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "X-User-Role";

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the billing routes.
#[derive(Clone)]
pub struct BillingAppState {
    pub coordinator: Arc<SubscriptionCoordinator>,
    pub ingester: Arc<EventIngester>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Caller Context
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated caller, as asserted by the upstream auth layer.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: Option<String>,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER)
            .and_then(|s| UserId::new(s).ok())
            .ok_or(AuthenticationRequired)?;
        let role = header_value(parts, USER_ROLE_HEADER).map(str::to_string);

        Ok(AuthenticatedUser { user_id, role })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/subscriptions/plans - Purchasable plans
pub async fn list_plans(
    State(state): State<BillingAppState>,
) -> Result<impl IntoResponse, BillingApiError> {
    let plans = state.coordinator.catalog().list_plans().await?;

    Ok(Json(PlanListResponse {
        plans: plans.into_iter().map(PlanResponse::from).collect(),
    }))
}

/// GET /api/subscriptions/mine - Caller's subscriptions
pub async fn list_my_subscriptions(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let details = state
        .coordinator
        .list_user_subscriptions(&user.user_id)
        .await?;

    Ok(Json(SubscriptionListResponse {
        subscriptions: details
            .into_iter()
            .map(SubscriptionDetailResponse::from)
            .collect(),
    }))
}

/// GET /api/subscriptions/:id - One subscription
///
/// Admins read any subscription; other callers only their own.
pub async fn get_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Path(subscription_id): Path<String>,
) -> Result<impl IntoResponse, BillingApiError> {
    let detail = if user.is_admin() {
        state.coordinator.get_subscription(&subscription_id).await?
    } else {
        state
            .coordinator
            .get_user_subscription(&user.user_id, &subscription_id)
            .await?
    };
    Ok(Json(SubscriptionDetailResponse::from(detail)))
}

/// GET /api/subscriptions - Audit listing (admin only)
pub async fn list_all_subscriptions(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    if !user.is_admin() {
        return Err(BillingApiError::Forbidden);
    }

    let summaries = state.coordinator.list_all_subscriptions().await?;

    Ok(Json(SubscriptionAuditResponse {
        subscriptions: summaries
            .into_iter()
            .map(SubscriptionSummaryResponse::from)
            .collect(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscriptions/checkout - Start checkout
pub async fn checkout(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let redirect = state
        .coordinator
        .checkout_subscription(&request.plan_id, &user.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(redirect))))
}

/// POST /api/subscriptions/cancel - Cancel the caller's subscription
///
/// 204 when the provider confirmed; 202 when only the local entitlement is cleared.
pub async fn cancel(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
) -> Result<Response, BillingApiError> {
    let outcome = state.coordinator.cancel_subscription(&user.user_id).await?;

    let response = match CancelPendingResponse::from_outcome(outcome) {
        Some(pending) => (StatusCode::ACCEPTED, Json(pending)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(response)
}

/// POST /api/webhooks/stripe - Provider-pushed events
///
/// A missing signature header is passed through as empty and rejected by the
/// verifier.
pub async fn handle_stripe_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let outcome = state
        .ingester
        .ingest(&body, signature)
        .await
        .map_err(BillingApiError::from_webhook)?;

    Ok(Json(WebhookResponse::from(&outcome)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub enum BillingApiError {
    Billing(BillingError),
    Forbidden,
    /// A webhook the provider should deliver again later.
    Redeliver(BillingError),
}

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self::Billing(err)
    }
}

impl BillingApiError {
    /// A confirmed event for a user that does not exist yet is answered with a
    /// 5xx so the provider keeps redelivering it.
    pub fn from_webhook(err: BillingError) -> Self {
        match err {
            BillingError::UserNotFound(_) => BillingApiError::Redeliver(err),
            other => BillingApiError::Billing(other),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            BillingApiError::Forbidden => StatusCode::FORBIDDEN,
            BillingApiError::Redeliver(_) => StatusCode::SERVICE_UNAVAILABLE,
            BillingApiError::Billing(err) => match err {
                BillingError::UserNotFound(_)
                | BillingError::PlanNotFound(_)
                | BillingError::SubscriptionNotFound(_) => StatusCode::NOT_FOUND,
                BillingError::NoActiveSubscription(_)
                | BillingError::SubscriptionAlreadyActive(_) => StatusCode::CONFLICT,
                BillingError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
                BillingError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
                BillingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            BillingApiError::Forbidden => {
                ErrorResponse::new("FORBIDDEN", "Administrator role required")
            }
            BillingApiError::Billing(BillingError::Store(detail)) => {
                tracing::error!(error = %detail, "Entitlement store failure");
                ErrorResponse::new("INTERNAL_ERROR", "Internal error")
            }
            BillingApiError::Billing(err) | BillingApiError::Redeliver(err) => {
                ErrorResponse::new(err.code(), err.to_string())
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: BillingError) -> StatusCode {
        BillingApiError::from(err).into_response().status()
    }

    #[test]
    fn not_found_family_maps_to_404() {
        assert_eq!(status_of(BillingError::user_not_found("u1")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(BillingError::plan_not_found("p1")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(BillingError::subscription_not_found("s1")),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn state_conflicts_map_to_409() {
        let user = UserId::new("u1").unwrap();
        assert_eq!(
            status_of(BillingError::NoActiveSubscription(user.clone())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(BillingError::SubscriptionAlreadyActive(user)),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn provider_event_and_store_errors_map() {
        assert_eq!(
            status_of(BillingError::provider_unavailable("down")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_of(BillingError::invalid_event("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(BillingError::Store("pool timeout".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unmatched_webhook_asks_for_redelivery() {
        let response = BillingApiError::from_webhook(BillingError::user_not_found("cus_1"))
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = BillingApiError::from_webhook(BillingError::invalid_event("bad"))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn forbidden_maps_to_403() {
        assert_eq!(
            BillingApiError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn only_admin_role_is_admin() {
        let user = |role: Option<&str>| AuthenticatedUser {
            user_id: UserId::new("u1").unwrap(),
            role: role.map(str::to_string),
        };
        assert!(user(Some("admin")).is_admin());
        assert!(!user(Some("user")).is_admin());
        assert!(!user(None).is_admin());
    }
}
