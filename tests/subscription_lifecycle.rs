//! Two-phase subscription lifecycle through the public API.
//!
//! Phase one (checkout) only binds a customer; phase two (a signed provider
//! event) commits the entitlement. Cancel clears locally before the remote call.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use subscription_sync::adapters::memory::InMemoryEntitlementStore;
use subscription_sync::adapters::stripe::{
    sign_payload, MockProviderGateway, StripeConfig, StripeWebhookVerifier,
};
use subscription_sync::application::billing::{
    CancelOutcome, CoordinatorSettings, EventIngester, IngestOutcome, PlanCatalog,
    ReconcileCommand, ReconcileOutcome, RevokeCommand, SubscriptionCoordinator, UserLocks,
};
use subscription_sync::domain::billing::{
    BillingError, BillingInterval, BillingUser, Plan, PlanTierFilter, SubscriptionItem,
    SubscriptionLink, SubscriptionSnapshot, SubscriptionStatus, SummaryPricing,
};
use subscription_sync::domain::foundation::UserId;
use subscription_sync::ports::ProviderError;

const SECRET: &str = "whsec_lifecycle";

// ════════════════════════════════════════════════════════════════════════════════
// Fixture
// ════════════════════════════════════════════════════════════════════════════════

struct Billing {
    store: Arc<InMemoryEntitlementStore>,
    provider: MockProviderGateway,
    coordinator: Arc<SubscriptionCoordinator>,
    ingester: EventIngester,
}

impl Billing {
    fn new() -> Self {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let provider = MockProviderGateway::new();
        let gateway = Arc::new(provider.clone());
        let catalog = PlanCatalog::new(gateway.clone(), PlanTierFilter::default());
        let coordinator = Arc::new(SubscriptionCoordinator::new(
            store.clone(),
            gateway,
            catalog,
            Arc::new(UserLocks::new()),
            CoordinatorSettings {
                success_url: "https://app.example.com/billing/success".to_string(),
                cancel_url: "https://app.example.com/billing/cancel".to_string(),
                summary_pricing: SummaryPricing::default(),
            },
        ));
        let verifier = Arc::new(StripeWebhookVerifier::new(StripeConfig::new(
            "sk_test_key",
            SECRET,
        )));
        let ingester = EventIngester::new(verifier, coordinator.clone());

        Self {
            store,
            provider,
            coordinator,
            ingester,
        }
    }

    fn user(&self, id: &str) -> BillingUser {
        self.store.user(&uid(id)).expect("seeded user")
    }

    async fn deliver(&self, event_type: &str, object: serde_json::Value) -> Result<IngestOutcome, BillingError> {
        let now = chrono::Utc::now().timestamp();
        let payload = json!({
            "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
            "type": event_type,
            "created": now,
            "livemode": false,
            "data": { "object": object },
        })
        .to_string();
        let signature = sign_payload(SECRET, now, payload.as_bytes());
        self.ingester.ingest(payload.as_bytes(), &signature).await
    }
}

fn uid(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn plan(id: &str, amount: i64, interval: BillingInterval) -> Plan {
    Plan {
        id: id.to_string(),
        amount,
        currency: "usd".to_string(),
        interval,
    }
}

fn snapshot(id: &str, customer: &str, plan_id: &str) -> SubscriptionSnapshot {
    SubscriptionSnapshot {
        id: id.to_string(),
        status: SubscriptionStatus::new(SubscriptionStatus::ACTIVE),
        customer_id: customer.to_string(),
        current_period_start: 1_700_000_000,
        current_period_end: 1_702_592_000,
        created: 1_700_000_000,
        items: vec![SubscriptionItem {
            plan_id: plan_id.to_string(),
            amount: 500,
            currency: "usd".to_string(),
            interval: BillingInterval::Month,
        }],
        latest_invoice: Some("in_1".to_string()),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Scenarios
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn checkout_then_webhook_commits_entitlement() {
    let billing = Billing::new();
    billing.provider.add_plan(plan("p1", 500, BillingInterval::Month));
    billing
        .store
        .insert_user(BillingUser::new(uid("u1"), "u1@example.com", "User One"));

    let redirect = billing
        .coordinator
        .checkout_subscription("p1", &uid("u1"))
        .await
        .unwrap();
    assert!(redirect.url.starts_with("https://"));

    // Phase one binds the customer only
    let user = billing.user("u1");
    let customer_id = user.customer_id.clone().expect("customer bound");
    assert!(user.subscription.is_none());

    let requests = billing.provider.checkout_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].plan_id, "p1");
    assert_eq!(requests[0].customer_id, customer_id);

    // The customer pays; the provider now holds the subscription
    billing
        .provider
        .add_subscription(snapshot("sub_1", &customer_id, "p1"));

    let outcome = billing
        .deliver(
            "checkout.session.completed",
            json!({
                "id": redirect.session_id,
                "mode": "subscription",
                "payment_status": "paid",
                "subscription": "sub_1",
                "customer": customer_id,
                "customer_details": { "email": "u1@example.com" },
                "metadata": { "plan_id": "p1", "user_id": "u1" },
            }),
        )
        .await
        .unwrap();
    assert_eq!(outcome.label(), "reconciled");

    let user = billing.user("u1");
    assert_eq!(user.subscription, Some(SubscriptionLink::new("sub_1", "p1")));
    assert_eq!(user.customer_id.as_deref(), Some(customer_id.as_str()));
}

#[tokio::test]
async fn redelivered_event_is_unchanged() {
    let billing = Billing::new();
    billing.store.insert_user(
        BillingUser::new(uid("u1"), "u1@example.com", "User One").with_customer("cus_1"),
    );
    billing.provider.add_subscription(snapshot("sub_1", "cus_1", "plan_1"));
    let object = json!({
        "id": "sub_1",
        "customer": "cus_1",
        "status": "active",
        "items": { "data": [ { "plan": { "id": "plan_1" } } ] },
    });

    let first = billing
        .deliver("customer.subscription.created", object.clone())
        .await
        .unwrap();
    let second = billing
        .deliver("customer.subscription.updated", object)
        .await
        .unwrap();

    assert_eq!(first.label(), "reconciled");
    assert_eq!(second.label(), "unchanged");
    assert_eq!(billing.user("u1").plan_id(), Some("plan_1"));
}

#[tokio::test]
async fn provider_deletion_revokes_entitlement() {
    let billing = Billing::new();
    billing.store.insert_user(
        BillingUser::new(uid("u1"), "u1@example.com", "User One")
            .with_customer("cus_1")
            .with_subscription(SubscriptionLink::new("sub_1", "plan_1")),
    );

    let outcome = billing
        .deliver(
            "customer.subscription.deleted",
            json!({
                "id": "sub_1",
                "customer": "cus_1",
                "status": "canceled",
                "items": { "data": [] },
            }),
        )
        .await
        .unwrap();

    assert_eq!(outcome.label(), "revoked");
    let user = billing.user("u1");
    assert!(user.subscription.is_none());
    assert_eq!(user.customer_id.as_deref(), Some("cus_1"));
}

#[tokio::test]
async fn webhook_for_unknown_customer_asks_for_redelivery() {
    let billing = Billing::new();
    billing
        .provider
        .add_subscription(snapshot("sub_9", "cus_nobody", "plan_1"));

    let err = billing
        .deliver(
            "customer.subscription.created",
            json!({
                "id": "sub_9",
                "customer": "cus_nobody",
                "status": "active",
                "items": { "data": [ { "plan": { "id": "plan_1" } } ] },
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::UserNotFound(_)));
}

#[tokio::test]
async fn late_update_after_deletion_does_not_regrant() {
    let billing = Billing::new();
    billing.store.insert_user(
        BillingUser::new(uid("u1"), "u1@example.com", "User One")
            .with_customer("cus_1")
            .with_subscription(SubscriptionLink::new("sub_1", "plan_1")),
    );
    billing.provider.add_subscription(snapshot("sub_1", "cus_1", "plan_1"));
    let mut object = json!({
        "id": "sub_1",
        "customer": "cus_1",
        "status": "canceled",
        "items": { "data": [ { "plan": { "id": "plan_1" } } ] },
    });

    // Provider terminates the subscription, then an older update arrives
    let mut ended = snapshot("sub_1", "cus_1", "plan_1");
    ended.status = SubscriptionStatus::new(SubscriptionStatus::CANCELED);
    billing.provider.add_subscription(ended);
    billing
        .deliver("customer.subscription.deleted", object.clone())
        .await
        .unwrap();
    object["status"] = json!("active");
    let late = billing
        .deliver("customer.subscription.updated", object)
        .await
        .unwrap();

    assert_eq!(late.label(), "ignored");
    assert!(billing.user("u1").subscription.is_none());
}

#[tokio::test]
async fn redelivered_checkout_after_user_cancel_does_not_regrant() {
    let billing = Billing::new();
    billing.store.insert_user(
        BillingUser::new(uid("u1"), "u1@example.com", "User One")
            .with_customer("cus_1")
            .with_subscription(SubscriptionLink::new("sub_1", "plan_1")),
    );
    billing.provider.add_subscription(snapshot("sub_1", "cus_1", "plan_1"));

    let cancelled = billing
        .coordinator
        .cancel_subscription(&uid("u1"))
        .await
        .unwrap();
    assert!(matches!(cancelled, CancelOutcome::Cancelled { .. }));

    let outcome = billing
        .deliver(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "subscription",
                "payment_status": "paid",
                "subscription": "sub_1",
                "customer": "cus_1",
                "customer_details": { "email": "u1@example.com" },
                "metadata": { "plan_id": "plan_1" },
            }),
        )
        .await
        .unwrap();

    assert_eq!(outcome.label(), "ignored");
    assert!(billing.user("u1").subscription.is_none());
}

#[tokio::test]
async fn cancel_without_subscription_makes_no_remote_call() {
    let billing = Billing::new();
    billing
        .store
        .insert_user(BillingUser::new(uid("u2"), "u2@example.com", "User Two"));

    let err = billing
        .coordinator
        .cancel_subscription(&uid("u2"))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::NoActiveSubscription(_)));
    assert!(billing.provider.calls().is_empty());
}

#[tokio::test]
async fn reconcile_assigns_entitlement_to_customer_owner() {
    let billing = Billing::new();
    billing.store.insert_user(
        BillingUser::new(uid("u1"), "a@x.com", "User One").with_customer("cus_1"),
    );

    let outcome = billing
        .coordinator
        .reconcile(ReconcileCommand {
            subscription_id: "sub_1".to_string(),
            customer_id: "cus_1".to_string(),
            email: Some("a@x.com".to_string()),
            plan_id: "plan_1".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Applied { user_id: uid("u1") });
    assert_eq!(
        billing.user("u1").subscription,
        Some(SubscriptionLink::new("sub_1", "plan_1"))
    );
}

#[tokio::test]
async fn audit_listing_omits_unowned_subscriptions() {
    let billing = Billing::new();
    billing.store.insert_user(
        BillingUser::new(uid("u1"), "u1@example.com", "User One").with_customer("cus_1"),
    );
    billing.provider.add_subscription(snapshot("sub_1", "cus_1", "plan_1"));
    billing.provider.add_subscription(snapshot("sub_orphan", "cus_gone", "plan_1"));

    let summaries = billing.coordinator.list_all_subscriptions().await.unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, "sub_1");
    assert_eq!(summaries[0].user.email, "u1@example.com");
}

// ════════════════════════════════════════════════════════════════════════════════
// Properties
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn checkout_leaves_entitlement_untouched() {
    let billing = Billing::new();
    billing.provider.add_plan(plan("p2", 1500, BillingInterval::Month));
    billing.store.insert_user(
        BillingUser::new(uid("u1"), "u1@example.com", "User One").with_customer("cus_1"),
    );
    let before = billing.user("u1");

    billing
        .coordinator
        .checkout_subscription("p2", &uid("u1"))
        .await
        .unwrap();

    assert_eq!(billing.user("u1"), before);
    assert!(!billing.provider.was_called("create_customer"));
}

#[tokio::test]
async fn cancel_clears_entitlement_whatever_the_provider_says() {
    for provider_fails in [false, true] {
        let billing = Billing::new();
        billing.store.insert_user(
            BillingUser::new(uid("u1"), "u1@example.com", "User One")
                .with_customer("cus_1")
                .with_subscription(SubscriptionLink::new("sub_1", "plan_1")),
        );
        billing.provider.add_subscription(snapshot("sub_1", "cus_1", "plan_1"));
        if provider_fails {
            billing
                .provider
                .set_method_error("cancel_subscription", ProviderError::network("timeout"));
        }

        let outcome = billing
            .coordinator
            .cancel_subscription(&uid("u1"))
            .await
            .unwrap();

        assert_eq!(outcome.subscription_id(), "sub_1");
        assert_eq!(
            matches!(outcome, CancelOutcome::ProviderCancelPending { .. }),
            provider_fails
        );
        let user = billing.user("u1");
        assert!(user.subscription.is_none());
        assert!(user.plan_id().is_none());
    }
}

#[tokio::test]
async fn tier_marker_matches_anywhere_in_price() {
    let billing = Billing::new();
    billing.provider.add_plan(plan("basic", 500, BillingInterval::Month));
    billing.provider.add_plan(plan("pro", 1500, BillingInterval::Month));
    billing.provider.add_plan(plan("team", 2000, BillingInterval::Month));

    let ids: Vec<String> = billing
        .coordinator
        .catalog()
        .list_plans()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();

    assert_eq!(ids, vec!["basic", "pro"]);
}

#[derive(Debug, Clone)]
enum Op {
    Checkout { user: usize },
    Confirm { user: usize, sub: u8, plan: u8 },
    Cancel { user: usize },
    Revoke { user: usize, sub: u8 },
    FailCancels(bool),
}

const USERS: usize = 3;

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..USERS).prop_map(|user| Op::Checkout { user }),
        (0..USERS, 0u8..4, 0u8..2).prop_map(|(user, sub, plan)| Op::Confirm { user, sub, plan }),
        (0..USERS).prop_map(|user| Op::Cancel { user }),
        (0..USERS, 0u8..4).prop_map(|(user, sub)| Op::Revoke { user, sub }),
        any::<bool>().prop_map(Op::FailCancels),
    ]
}

fn seeded() -> Billing {
    let billing = Billing::new();
    billing.provider.add_plan(plan("plan_0", 500, BillingInterval::Month));
    billing.provider.add_plan(plan("plan_1", 1500, BillingInterval::Year));
    for n in 0..USERS {
        billing.store.insert_user(BillingUser::new(
            uid(&format!("u{}", n)),
            format!("u{}@example.com", n),
            format!("User {}", n),
        ));
    }
    billing
}

/// Applies one operation; business errors are expected and ignored.
async fn apply(billing: &Billing, op: Op) {
    match op {
        Op::Checkout { user } => {
            let plan_id = format!("plan_{}", user % 2);
            let _ = billing
                .coordinator
                .checkout_subscription(&plan_id, &uid(&format!("u{}", user)))
                .await;
        }
        Op::Confirm { user, sub, plan } => {
            let user_id = uid(&format!("u{}", user));
            let customer_id = billing
                .store
                .user(&user_id)
                .and_then(|u| u.customer_id)
                .unwrap_or_else(|| format!("cus_{}", user));
            let subscription_id = format!("sub_{}_{}", user, sub);
            let plan_id = format!("plan_{}", plan);
            billing
                .provider
                .add_subscription(snapshot(&subscription_id, &customer_id, &plan_id));
            let _ = billing
                .coordinator
                .reconcile(ReconcileCommand {
                    subscription_id,
                    customer_id,
                    email: Some(format!("u{}@example.com", user)),
                    plan_id,
                })
                .await;
        }
        Op::Cancel { user } => {
            let _ = billing
                .coordinator
                .cancel_subscription(&uid(&format!("u{}", user)))
                .await;
        }
        Op::Revoke { user, sub } => {
            let customer_id = billing
                .store
                .user(&uid(&format!("u{}", user)))
                .and_then(|u| u.customer_id)
                .unwrap_or_else(|| format!("cus_{}", user));
            let _ = billing
                .coordinator
                .revoke(RevokeCommand {
                    subscription_id: format!("sub_{}_{}", user, sub),
                    customer_id,
                })
                .await;
        }
        Op::FailCancels(fail) => {
            if fail {
                billing
                    .provider
                    .set_method_error("cancel_subscription", ProviderError::network("down"));
            } else {
                billing.provider.clear_errors();
            }
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn existing_user() -> impl Strategy<Value = BillingUser> {
    (
        proptest::option::of("cus_[0-2]"),
        proptest::option::of(("sub_[0-2]", "plan_[0-1]")),
    )
        .prop_map(|(customer, link)| {
            let mut user = BillingUser::new(uid("u0"), "u0@example.com", "User Zero");
            if let Some(customer) = customer {
                user = user.with_customer(customer);
                if let Some((sub, plan)) = link {
                    user = user.with_subscription(SubscriptionLink::new(sub, plan));
                }
            }
            user
        })
}

fn command() -> impl Strategy<Value = ReconcileCommand> {
    (
        "sub_[0-2]",
        "cus_[0-2]",
        proptest::option::of(prop_oneof![
            Just("u0@example.com".to_string()),
            Just("other@example.com".to_string()),
        ]),
        "plan_[0-1]",
    )
        .prop_map(|(subscription_id, customer_id, email, plan_id)| ReconcileCommand {
            subscription_id,
            customer_id,
            email,
            plan_id,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn entitlement_always_has_customer(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let rt = runtime();
        let billing = seeded();

        for op in ops {
            rt.block_on(apply(&billing, op.clone()));
            for user in billing.store.users() {
                prop_assert!(
                    user.entitlement_is_consistent(),
                    "after {:?}: {:?}",
                    op,
                    user
                );
            }
        }
    }

    #[test]
    fn reconcile_twice_equals_once(user in existing_user(), cmd in command()) {
        let rt = runtime();
        let billing = Billing::new();
        billing.store.insert_user(user);

        let first = rt.block_on(billing.coordinator.reconcile(cmd.clone()));
        let after_first = billing.store.users();
        let second = rt.block_on(billing.coordinator.reconcile(cmd));

        prop_assert_eq!(billing.store.users(), after_first);
        match first {
            Ok(_) => prop_assert_eq!(second.ok(), Some(ReconcileOutcome::Unchanged)),
            Err(_) => prop_assert!(second.is_err()),
        }
    }
}
