//! Application layer - Services that orchestrate the domain over the ports.
//!
//! Commands (checkout, cancel, reconcile, revoke) take the per-user lock around
//! their read-modify-write; queries go straight to the provider.

pub mod billing;

pub use billing::{
    CancelOutcome, CheckoutRedirect, CoordinatorSettings, EventIngester, IngestOutcome,
    PlanCatalog, ReconcileCommand, ReconcileOutcome, RevokeCommand, SubscriptionCoordinator,
    UserLocks,
};
