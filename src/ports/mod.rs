//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `ProviderGateway` - The subscription-billing provider API
//! - `EntitlementStore` - Billing fields of the internal user record
//! - `WebhookVerifier` - Authentication of provider-pushed events

mod entitlement_store;
mod provider_gateway;
mod webhook_verifier;

pub use entitlement_store::EntitlementStore;
pub use provider_gateway::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, ProviderError,
    ProviderErrorCode, ProviderGateway, SubscriptionFilter,
};
pub use webhook_verifier::{VerifiedEvent, WebhookVerificationError, WebhookVerifier};
