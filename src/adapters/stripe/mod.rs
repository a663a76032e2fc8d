//! Stripe provider adapter.
//!
//! Implements the provider ports for Stripe:
//! - `ProviderGateway` over the REST API (customers, plans, checkout, subscriptions)
//! - `WebhookVerifier` for `Stripe-Signature` headers
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated to prevent replay attacks (5-minute window)
//! - All secrets are handled via `secrecy::SecretString`

mod mock_gateway;
mod stripe_gateway;
mod webhook_verifier;
mod wire_types;

pub use mock_gateway::{MethodCall, MockProviderGateway};
pub use stripe_gateway::{StripeConfig, StripeProviderGateway};
pub use webhook_verifier::{sign_payload, StripeWebhookVerifier};
pub use wire_types::{SignatureHeader, SignatureParseError};
