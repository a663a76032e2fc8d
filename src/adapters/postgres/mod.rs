//! PostgreSQL adapters - Database implementations for store ports.
//!
//! - `PostgresEntitlementStore` - Billing columns of the `users` table

mod entitlement_store;

pub use entitlement_store::PostgresEntitlementStore;
