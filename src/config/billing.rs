//! Billing behaviour configuration

use serde::Deserialize;

use crate::application::billing::CoordinatorSettings;
use crate::domain::billing::{PlanTierFilter, SummaryPricing};

use super::error::ValidationError;

/// Checkout redirects and the catalog/audit pricing policies.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Provider redirect after a completed checkout
    pub success_url: String,

    /// Provider redirect after an abandoned checkout
    pub cancel_url: String,

    /// Digit a plan's display price must contain to be listed
    #[serde(default = "default_tier_marker")]
    pub plan_tier_marker: String,

    #[serde(default)]
    pub summary_pricing: SummaryPricingConfig,
}

/// Audit-view line pricing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SummaryPricingConfig {
    FixedTiers {
        #[serde(default = "default_monthly_price")]
        monthly_price: String,
        #[serde(default = "default_other_price")]
        other_price: String,
    },
    PlanAmount,
}

impl Default for SummaryPricingConfig {
    fn default() -> Self {
        SummaryPricingConfig::FixedTiers {
            monthly_price: default_monthly_price(),
            other_price: default_other_price(),
        }
    }
}

impl From<&SummaryPricingConfig> for SummaryPricing {
    fn from(config: &SummaryPricingConfig) -> Self {
        match config {
            SummaryPricingConfig::FixedTiers {
                monthly_price,
                other_price,
            } => SummaryPricing::FixedTiers {
                monthly: monthly_price.clone(),
                other: other_price.clone(),
            },
            SummaryPricingConfig::PlanAmount => SummaryPricing::PlanAmount,
        }
    }
}

impl BillingConfig {
    /// Catalog filter. Falls back to the default marker if validation was skipped.
    pub fn tier_filter(&self) -> PlanTierFilter {
        match single_digit(&self.plan_tier_marker) {
            Some(marker) => PlanTierFilter::new(marker),
            None => PlanTierFilter::default(),
        }
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            success_url: self.success_url.clone(),
            cancel_url: self.cancel_url.clone(),
            summary_pricing: SummaryPricing::from(&self.summary_pricing),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_redirect("BILLING__SUCCESS_URL", &self.success_url)?;
        check_redirect("BILLING__CANCEL_URL", &self.cancel_url)?;
        if single_digit(&self.plan_tier_marker).is_none() {
            return Err(ValidationError::InvalidTierMarker);
        }
        Ok(())
    }
}

fn single_digit(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_digit() => Some(c),
        _ => None,
    }
}

fn check_redirect(name: &'static str, url: &str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::MissingRequired(name));
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or(ValidationError::InvalidRedirectUrl(name))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ValidationError::InvalidRedirectUrl(name));
    }
    Ok(())
}

fn default_tier_marker() -> String {
    "5".to_string()
}

fn default_monthly_price() -> String {
    "5".to_string()
}

fn default_other_price() -> String {
    "50".to_string()
}
