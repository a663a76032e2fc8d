//! Billing domain - Entitlements, plans, and provider subscription views.
//!
//! The provider owns plans and subscriptions; this module only models what the
//! core reads from it and the slice of the user record it writes.

mod errors;
mod plan;
mod subscription;
mod user;

pub use errors::BillingError;
pub use plan::{format_minor_units, BillingInterval, CatalogPlan, Plan, PlanTierFilter};
pub use subscription::{
    PlanLine, SubscriberView, SubscriptionDetail, SubscriptionItem, SubscriptionSnapshot,
    SubscriptionStatus, SubscriptionSummary, SummaryPricing,
};
pub use user::{BillingUser, SubscriptionLink};
