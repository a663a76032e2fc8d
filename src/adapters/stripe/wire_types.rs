//! Stripe wire types.
//!
//! These types represent Stripe API objects as they arrive in REST responses and
//! webhook payloads. Only the fields this crate reads are captured; everything else
//! Stripe sends is ignored.

use serde::Deserialize;

use crate::domain::billing::{BillingInterval, Plan, SubscriptionItem, SubscriptionSnapshot, SubscriptionStatus};
use crate::ports::ProviderError;

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureParseError {
    /// Header is empty or missing.
    MissingHeader,
    /// Missing timestamp component (t=...).
    MissingTimestamp,
    /// Missing v1 signature component.
    MissingV1Signature,
    /// Invalid timestamp format.
    InvalidTimestamp,
    /// Invalid signature format (not valid hex).
    InvalidSignatureFormat,
}

impl std::fmt::Display for SignatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "Missing Stripe-Signature header"),
            Self::MissingTimestamp => write!(f, "Missing timestamp (t=) in signature"),
            Self::MissingV1Signature => write!(f, "Missing v1 signature in header"),
            Self::InvalidTimestamp => write!(f, "Invalid timestamp format"),
            Self::InvalidSignatureFormat => write!(f, "Invalid signature format (not valid hex)"),
        }
    }
}

impl std::error::Error for SignatureParseError {}

/// Parsed Stripe-Signature header.
///
/// Format: `t=timestamp,v1=signature[,v1=signature...]`. Stripe sends more than one
/// `v1` entry while a signing secret is being rolled.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp when Stripe signed the event.
    pub timestamp: i64,

    /// Every v1 signature (HMAC-SHA256) in the header.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.trim().is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or(SignatureParseError::MissingTimestamp)?;

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    v1_signatures.push(
                        hex::decode(value.trim())
                            .map_err(|_| SignatureParseError::InvalidSignatureFormat)?,
                    );
                }
                // v0 and future schemes are not verified
                _ => {}
            }
        }

        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }

        Ok(Self {
            timestamp: timestamp.ok_or(SignatureParseError::MissingTimestamp)?,
            v1_signatures,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// REST Objects
// ════════════════════════════════════════════════════════════════════════════════

/// Paginated Stripe list response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,

    #[serde(default)]
    pub has_more: bool,
}

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    /// Unique customer identifier (cus_...).
    pub id: String,

    pub email: Option<String>,

    /// Absent on deleted customers.
    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub deleted: bool,
}

/// Stripe Plan object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePlan {
    pub id: String,

    /// Amount in minor units. Null for tiered plans.
    pub amount: Option<i64>,

    pub currency: String,

    pub interval: String,
}

impl StripePlan {
    pub fn into_plan(self) -> Result<Plan, ProviderError> {
        let interval = parse_interval(&self.interval)?;
        Ok(Plan {
            id: self.id,
            amount: self.amount.unwrap_or(0),
            currency: self.currency,
            interval,
        })
    }
}

/// Stripe Price object, for subscription items that carry no legacy plan.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,

    pub unit_amount: Option<i64>,

    pub currency: String,

    pub recurring: Option<StripePriceRecurring>,
}

/// Price recurring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePriceRecurring {
    /// Billing interval (day, week, month, year).
    pub interval: String,
}

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    /// Hosted page URL. Null once the session is complete or expired.
    pub url: Option<String>,
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    pub customer: String,

    pub status: String,

    pub current_period_start: i64,

    pub current_period_end: i64,

    pub created: i64,

    /// Unexpanded invoice id.
    pub latest_invoice: Option<String>,

    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

/// Subscription items container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeSubscriptionItems {
    #[serde(default)]
    pub data: Vec<StripeSubscriptionItem>,
}

/// Single subscription item.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub plan: Option<StripePlan>,

    pub price: Option<StripePrice>,
}

impl StripeSubscriptionItem {
    fn into_item(self) -> Result<SubscriptionItem, ProviderError> {
        if let Some(plan) = self.plan {
            let plan = plan.into_plan()?;
            return Ok(SubscriptionItem {
                plan_id: plan.id,
                amount: plan.amount,
                currency: plan.currency,
                interval: plan.interval,
            });
        }

        let price = self
            .price
            .ok_or_else(|| ProviderError::invalid_response("Subscription item has no plan or price"))?;
        let recurring = price
            .recurring
            .ok_or_else(|| ProviderError::invalid_response("Subscription price is not recurring"))?;

        Ok(SubscriptionItem {
            plan_id: price.id,
            amount: price.unit_amount.unwrap_or(0),
            currency: price.currency,
            interval: parse_interval(&recurring.interval)?,
        })
    }
}

impl StripeSubscription {
    pub fn into_snapshot(self) -> Result<SubscriptionSnapshot, ProviderError> {
        let items = self
            .items
            .data
            .into_iter()
            .map(StripeSubscriptionItem::into_item)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SubscriptionSnapshot {
            id: self.id,
            status: SubscriptionStatus::new(self.status),
            customer_id: self.customer,
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
            created: self.created,
            items,
            latest_invoice: self.latest_invoice,
        })
    }
}

fn parse_interval(interval: &str) -> Result<BillingInterval, ProviderError> {
    BillingInterval::parse(interval)
        .ok_or_else(|| ProviderError::invalid_response(format!("Unknown interval '{}'", interval)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ════════════════════════════════════════════════════════════════════════════
    // SignatureHeader Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn parse_signature_header_valid() {
        let header = "t=1704067200,v1=5d41402abc4b2a76b9719d911017c592";
        let parsed = SignatureHeader::parse(header).unwrap();

        assert_eq!(parsed.timestamp, 1704067200);
        assert_eq!(parsed.v1_signatures.len(), 1);
        assert_eq!(
            hex::encode(&parsed.v1_signatures[0]),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn parse_signature_header_keeps_every_v1() {
        let header = "t=1704067200,v1=aabb,v0=ccdd,v1=eeff";
        let parsed = SignatureHeader::parse(header).unwrap();

        assert_eq!(parsed.v1_signatures.len(), 2);
        assert_eq!(hex::encode(&parsed.v1_signatures[1]), "eeff");
    }

    #[test]
    fn parse_signature_header_missing_timestamp() {
        let result = SignatureHeader::parse("v1=5d41402abc4b2a76b9719d911017c592");
        assert!(matches!(result, Err(SignatureParseError::MissingTimestamp)));
    }

    #[test]
    fn parse_signature_header_missing_v1() {
        let result = SignatureHeader::parse("t=1704067200,v0=aabbccdd");
        assert!(matches!(result, Err(SignatureParseError::MissingV1Signature)));
    }

    #[test]
    fn parse_signature_header_empty() {
        let result = SignatureHeader::parse("");
        assert!(matches!(result, Err(SignatureParseError::MissingHeader)));
    }

    #[test]
    fn parse_signature_header_invalid_timestamp() {
        let result = SignatureHeader::parse("t=not_a_number,v1=5d41");
        assert!(matches!(result, Err(SignatureParseError::InvalidTimestamp)));
    }

    #[test]
    fn parse_signature_header_invalid_hex() {
        let result = SignatureHeader::parse("t=1704067200,v1=not_valid_hex_xyz");
        assert!(matches!(result, Err(SignatureParseError::InvalidSignatureFormat)));

        let result = SignatureHeader::parse("t=1704067200,v1=abc");
        assert!(matches!(result, Err(SignatureParseError::InvalidSignatureFormat)));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Object Mapping Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn plan_maps_to_domain_plan() {
        let json = r#"{
            "id": "plan_monthly",
            "object": "plan",
            "amount": 500,
            "currency": "usd",
            "interval": "month",
            "interval_count": 1,
            "active": true
        }"#;

        let plan = serde_json::from_str::<StripePlan>(json).unwrap().into_plan().unwrap();

        assert_eq!(plan.id, "plan_monthly");
        assert_eq!(plan.amount, 500);
        assert_eq!(plan.interval, BillingInterval::Month);
    }

    #[test]
    fn plan_with_unknown_interval_is_invalid_response() {
        let plan = StripePlan {
            id: "plan_x".to_string(),
            amount: Some(100),
            currency: "usd".to_string(),
            interval: "quarter".to_string(),
        };
        let err = plan.into_plan().unwrap_err();
        assert_eq!(err.code, crate::ports::ProviderErrorCode::InvalidResponse);
    }

    #[test]
    fn subscription_maps_to_snapshot() {
        let json = r#"{
            "id": "sub_test_123",
            "object": "subscription",
            "customer": "cus_xyz",
            "status": "active",
            "created": 1704067200,
            "current_period_start": 1704067200,
            "current_period_end": 1706745600,
            "latest_invoice": "in_abc",
            "items": {
                "object": "list",
                "data": [
                    {
                        "id": "si_abc",
                        "plan": {
                            "id": "plan_yearly",
                            "amount": 5000,
                            "currency": "usd",
                            "interval": "year"
                        },
                        "quantity": 1
                    }
                ]
            }
        }"#;

        let snapshot = serde_json::from_str::<StripeSubscription>(json)
            .unwrap()
            .into_snapshot()
            .unwrap();

        assert_eq!(snapshot.id, "sub_test_123");
        assert!(snapshot.status.is_active());
        assert_eq!(snapshot.customer_id, "cus_xyz");
        assert_eq!(snapshot.latest_invoice.as_deref(), Some("in_abc"));
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].plan_id, "plan_yearly");
        assert_eq!(snapshot.items[0].interval, BillingInterval::Year);
    }

    #[test]
    fn subscription_item_falls_back_to_price() {
        let json = r#"{
            "id": "sub_price_only",
            "customer": "cus_1",
            "status": "past_due",
            "created": 1,
            "current_period_start": 1,
            "current_period_end": 2,
            "latest_invoice": null,
            "items": {
                "data": [
                    {
                        "price": {
                            "id": "price_monthly",
                            "unit_amount": 1500,
                            "currency": "cad",
                            "recurring": { "interval": "month", "interval_count": 1 }
                        }
                    }
                ]
            }
        }"#;

        let snapshot = serde_json::from_str::<StripeSubscription>(json)
            .unwrap()
            .into_snapshot()
            .unwrap();

        assert_eq!(snapshot.items[0].plan_id, "price_monthly");
        assert_eq!(snapshot.items[0].amount, 1500);
        assert_eq!(snapshot.status.as_str(), "past_due");
    }

    #[test]
    fn subscription_items_default_to_empty() {
        let json = r#"{
            "id": "sub_minimal",
            "customer": "cus_123",
            "status": "active",
            "created": 1704067200,
            "current_period_start": 1704067200,
            "current_period_end": 1706745600
        }"#;

        let sub: StripeSubscription = serde_json::from_str(json).unwrap();
        assert!(sub.items.data.is_empty());
        assert!(sub.latest_invoice.is_none());
    }

    #[test]
    fn list_defaults_has_more_to_false() {
        let list: StripeList<StripeCustomer> =
            serde_json::from_str(r#"{"object":"list","data":[{"id":"cus_1","created":1}]}"#)
                .unwrap();
        assert!(!list.has_more);
        assert_eq!(list.data[0].id, "cus_1");
    }
}
