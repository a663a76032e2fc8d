//! Provider plans and their catalog presentation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Billing interval of a recurring plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Day,
    Week,
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Day => "day",
            BillingInterval::Week => "week",
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }

    /// Parses the provider's interval name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(BillingInterval::Day),
            "week" => Some(BillingInterval::Week),
            "month" => Some(BillingInterval::Month),
            "year" => Some(BillingInterval::Year),
            _ => None,
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-defined price unit. Read-only from this core's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Lowercase ISO currency code, as the provider reports it.
    pub currency: String,
    pub interval: BillingInterval,
}

/// Formats minor currency units as a two-decimal display price ("1500" -> "15.00").
pub fn format_minor_units(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// A plan as presented in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogPlan {
    pub id: String,
    pub display_price: String,
    /// "{display_price} {currency}/{interval}"
    pub label: String,
    pub currency: String,
    pub amount: i64,
    pub interval: BillingInterval,
}

impl From<Plan> for CatalogPlan {
    fn from(plan: Plan) -> Self {
        let display_price = format_minor_units(plan.amount);
        let label = format!("{} {}/{}", display_price, plan.currency, plan.interval);
        Self {
            id: plan.id,
            display_price,
            label,
            currency: plan.currency,
            amount: plan.amount,
            interval: plan.interval,
        }
    }
}

/// Pricing-tier policy applied to the catalog.
///
/// A plan is shown when its formatted price contains the marker digit anywhere.
/// This is a plain substring match: with marker `5`, "15.00" and "0.50" pass too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanTierFilter {
    marker: char,
}

impl PlanTierFilter {
    pub fn new(marker: char) -> Self {
        Self { marker }
    }

    pub fn marker(&self) -> char {
        self.marker
    }

    pub fn includes(&self, plan: &CatalogPlan) -> bool {
        plan.display_price.contains(self.marker)
    }
}

impl Default for PlanTierFilter {
    fn default() -> Self {
        Self::new('5')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(amount: i64) -> Plan {
        Plan {
            id: format!("plan_{}", amount),
            amount,
            currency: "usd".to_string(),
            interval: BillingInterval::Month,
        }
    }

    #[test]
    fn formats_minor_units_with_two_decimals() {
        assert_eq!(format_minor_units(500), "5.00");
        assert_eq!(format_minor_units(1500), "15.00");
        assert_eq!(format_minor_units(1999), "19.99");
        assert_eq!(format_minor_units(5), "0.05");
        assert_eq!(format_minor_units(0), "0.00");
        assert_eq!(format_minor_units(-250), "-2.50");
    }

    #[test]
    fn catalog_plan_composes_label() {
        let catalog = CatalogPlan::from(plan(500));
        assert_eq!(catalog.display_price, "5.00");
        assert_eq!(catalog.label, "5.00 usd/month");
        assert_eq!(catalog.amount, 500);
    }

    #[test]
    fn tier_filter_matches_digit_anywhere() {
        let filter = PlanTierFilter::default();
        assert!(filter.includes(&CatalogPlan::from(plan(500))));
        assert!(filter.includes(&CatalogPlan::from(plan(1500))));
        assert!(filter.includes(&CatalogPlan::from(plan(50))));
        assert!(!filter.includes(&CatalogPlan::from(plan(1000))));
    }

    #[test]
    fn tier_filter_uses_configured_marker() {
        let filter = PlanTierFilter::new('9');
        assert!(filter.includes(&CatalogPlan::from(plan(1999))));
        assert!(!filter.includes(&CatalogPlan::from(plan(500))));
    }

    #[test]
    fn interval_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&BillingInterval::Year).unwrap(),
            "\"year\""
        );
        let parsed: BillingInterval = serde_json::from_str("\"month\"").unwrap();
        assert_eq!(parsed, BillingInterval::Month);
    }

    #[test]
    fn interval_parse_rejects_unknown_names() {
        assert_eq!(BillingInterval::parse("week"), Some(BillingInterval::Week));
        assert_eq!(BillingInterval::parse("fortnight"), None);
    }
}
