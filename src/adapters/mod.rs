//! Adapters - Implementations of port interfaces.
//!
//! - `stripe` - Provider gateway and webhook verification for Stripe
//! - `postgres` - Entitlement store over the `users` table
//! - `memory` - In-memory entitlement store for tests and development
//! - `http` - Axum routes

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
