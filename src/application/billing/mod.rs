//! Billing application services.
//!
//! - `PlanCatalog` - Purchasable plans
//! - `SubscriptionCoordinator` - Checkout, cancel, queries and reconciliation
//! - `EventIngester` - Provider webhook entry point
//! - `UserLocks` - Per-user serialization of entitlement writes

mod event_ingester;
mod plan_catalog;
mod reconcile;
mod subscription_coordinator;
mod user_locks;

pub use event_ingester::{event_types, EventIngester, IngestOutcome};
pub use plan_catalog::PlanCatalog;
pub use reconcile::{ReconcileCommand, ReconcileOutcome, RevokeCommand};
pub use subscription_coordinator::{
    CancelOutcome, CheckoutRedirect, CoordinatorSettings, SubscriptionCoordinator,
};
pub use user_locks::{UserLockGuard, UserLocks};
