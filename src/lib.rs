//! Subscription Sync - Keeps local entitlements in step with a payment provider
//!
//! Users buy plans through hosted checkout, the provider reports the outcome
//! through signed webhooks, and this crate reconciles those events into the
//! `subscription_id`/`plan_id`/`customer_id` fields of each user record.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
