//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `billing` - Entitlements, plans, and provider subscription views

pub mod billing;
pub mod foundation;
