//! Axum router configuration for subscription endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel, checkout, get_subscription, handle_stripe_webhook, list_all_subscriptions,
    list_my_subscriptions, list_plans, BillingAppState,
};

/// Create the subscription API router.
///
/// # Routes
///
/// ## Public
/// - `GET /plans` - Purchasable plans
///
/// ## User Endpoints (require `X-User-Id`)
/// - `POST /checkout` - Start checkout
/// - `POST /cancel` - Cancel the caller's subscription
/// - `GET /mine` - Caller's subscriptions
/// - `GET /:id` - One subscription
///
/// ## Admin Endpoints (require `X-User-Role: admin`)
/// - `GET /` - Audit listing
pub fn subscription_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/", get(list_all_subscriptions))
        .route("/plans", get(list_plans))
        .route("/checkout", post(checkout))
        .route("/cancel", post(cancel))
        .route("/mine", get(list_my_subscriptions))
        .route("/:id", get(get_subscription))
}

/// Create the webhook router.
///
/// Webhooks carry no user identity; they are authenticated by signature.
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Combined router, suitable for mounting at `/api`.
///
/// ```ignore
/// let app = Router::new()
///     .nest("/api", billing_router())
///     .with_state(state);
/// ```
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .nest("/subscriptions", subscription_routes())
        .nest("/webhooks", webhook_routes())
}
