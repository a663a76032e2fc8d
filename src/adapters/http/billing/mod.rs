//! HTTP adapter for subscription endpoints.
//!
//! Exposes the billing core via REST API:
//! - `GET /api/subscriptions/plans` - Purchasable plans
//! - `POST /api/subscriptions/checkout` - Start checkout
//! - `POST /api/subscriptions/cancel` - Cancel the caller's subscription
//! - `GET /api/subscriptions/mine` - Caller's subscriptions
//! - `GET /api/subscriptions/:id` - One subscription
//! - `GET /api/subscriptions` - Audit listing (admin)
//! - `POST /api/webhooks/stripe` - Stripe webhooks

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{AuthenticatedUser, BillingApiError, BillingAppState};
pub use routes::{billing_router, subscription_routes, webhook_routes};
