//! Provider subscription snapshots and the views derived from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Timestamp, UserId};

use super::plan::{format_minor_units, BillingInterval};
use super::user::BillingUser;

/// Provider subscription status.
///
/// The provider owns this vocabulary (active, canceled, past_due, incomplete, trialing,
/// unpaid, ...), so it is carried as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionStatus(String);

impl SubscriptionStatus {
    pub const ACTIVE: &'static str = "active";
    pub const CANCELED: &'static str = "canceled";

    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_active(&self) -> bool {
        self.0 == Self::ACTIVE
    }

    pub fn is_canceled(&self) -> bool {
        self.0 == Self::CANCELED
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One priced line of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub plan_id: String,
    pub amount: i64,
    pub currency: String,
    pub interval: BillingInterval,
}

/// The provider's view of a subscription at call time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub status: SubscriptionStatus,
    pub customer_id: String,
    /// Epoch seconds.
    pub current_period_start: i64,
    /// Epoch seconds.
    pub current_period_end: i64,
    /// Epoch seconds.
    pub created: i64,
    pub items: Vec<SubscriptionItem>,
    pub latest_invoice: Option<String>,
}

impl SubscriptionSnapshot {
    pub fn plan_ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.plan_id.as_str())
    }
}

/// Subscription detail with day-precision dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionDetail {
    pub id: String,
    pub current_period_start: NaiveDate,
    pub current_period_end: NaiveDate,
    pub status: SubscriptionStatus,
    pub latest_invoice: Option<String>,
    pub customer_id: String,
}

impl From<&SubscriptionSnapshot> for SubscriptionDetail {
    fn from(snapshot: &SubscriptionSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            current_period_start: Timestamp::from_unix_secs(snapshot.current_period_start)
                .calendar_day(),
            current_period_end: Timestamp::from_unix_secs(snapshot.current_period_end)
                .calendar_day(),
            status: snapshot.status.clone(),
            latest_invoice: snapshot.latest_invoice.clone(),
            customer_id: snapshot.customer_id.clone(),
        }
    }
}

/// How the admin audit view prices each subscription line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryPricing {
    /// Monthly lines show `monthly`, every other interval shows `other`.
    FixedTiers { monthly: String, other: String },
    /// Lines show the item's own amount.
    PlanAmount,
}

impl SummaryPricing {
    pub fn price_for(&self, item: &SubscriptionItem) -> String {
        match self {
            SummaryPricing::FixedTiers { monthly, other } => {
                if item.interval == BillingInterval::Month {
                    monthly.clone()
                } else {
                    other.clone()
                }
            }
            SummaryPricing::PlanAmount => format_minor_units(item.amount),
        }
    }
}

impl Default for SummaryPricing {
    fn default() -> Self {
        SummaryPricing::FixedTiers {
            monthly: "5".to_string(),
            other: "50".to_string(),
        }
    }
}

/// Priced line in the admin audit view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanLine {
    pub interval: BillingInterval,
    pub currency: String,
    pub price: String,
}

/// Subscriber identity shown in the admin audit view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
}

impl From<&BillingUser> for SubscriberView {
    fn from(user: &BillingUser) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role.clone(),
        }
    }
}

/// One row of the admin audit of all subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionSummary {
    pub id: String,
    pub created_at: Timestamp,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub status: SubscriptionStatus,
    pub plan: Vec<PlanLine>,
    pub user: SubscriberView,
}

impl SubscriptionSummary {
    pub fn build(
        snapshot: &SubscriptionSnapshot,
        owner: &BillingUser,
        pricing: &SummaryPricing,
    ) -> Self {
        Self {
            id: snapshot.id.clone(),
            created_at: Timestamp::from_unix_secs(snapshot.created),
            current_period_start: Timestamp::from_unix_secs(snapshot.current_period_start),
            current_period_end: Timestamp::from_unix_secs(snapshot.current_period_end),
            status: snapshot.status.clone(),
            plan: snapshot
                .items
                .iter()
                .map(|item| PlanLine {
                    interval: item.interval,
                    currency: item.currency.clone(),
                    price: pricing.price_for(item),
                })
                .collect(),
            user: SubscriberView::from(owner),
        }
    }
}
