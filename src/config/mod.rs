//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the `config`
//! and `dotenvy` crates. Variables use the `SUBSCRIPTION_SYNC` prefix and `__`
//! between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use subscription_sync::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod billing;
mod database;
mod error;
mod payment;
mod server;

pub use billing::{BillingConfig, SummaryPricingConfig};
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Bind address, environment, logging, request timeout
    #[serde(default)]
    pub server: ServerConfig,

    /// Entitlement store (PostgreSQL)
    pub database: DatabaseConfig,

    /// Stripe credentials
    pub payment: PaymentConfig,

    /// Checkout redirects and pricing policies
    pub billing: BillingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `SUBSCRIPTION_SYNC` prefix
    /// 3. Splits nested keys on `__`
    ///
    /// # Environment Variable Format
    ///
    /// - `SUBSCRIPTION_SYNC__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SUBSCRIPTION_SYNC__PAYMENT__STRIPE_API_KEY=...` -> `payment.stripe_api_key`
    /// - `SUBSCRIPTION_SYNC__BILLING__SUMMARY_PRICING__MODE=plan_amount`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUBSCRIPTION_SYNC")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Semantic validation of every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        self.billing.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
