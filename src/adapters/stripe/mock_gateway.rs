//! Mock provider gateway for testing.
//!
//! An in-memory stand-in for the billing provider. Supports:
//! - Seeded plans, customers, and subscriptions
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::billing::{Plan, SubscriptionSnapshot, SubscriptionStatus};
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, ProviderError,
    ProviderGateway, SubscriptionFilter,
};

/// Mock provider gateway for testing.
///
/// Clones share state, so a test can keep a handle for assertions after handing
/// one to the code under test.
///
/// # Example
///
/// ```ignore
/// let provider = MockProviderGateway::new();
/// provider.add_plan(plan);
/// provider.set_method_error("cancel_subscription", ProviderError::network("down"));
///
/// // ... exercise the coordinator ...
///
/// assert_eq!(provider.call_count("create_customer"), 1);
/// ```
#[derive(Default, Clone)]
pub struct MockProviderGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Plans in provider order.
    plans: Vec<Plan>,

    customers: HashMap<String, Customer>,

    /// Subscriptions in provider order.
    subscriptions: Vec<SubscriptionSnapshot>,

    /// Every checkout request received.
    checkout_requests: Vec<CreateCheckoutRequest>,

    /// Specific errors by method name.
    method_errors: HashMap<String, ProviderError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

fn mock_id(prefix: &str) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_mock_{}", prefix, &uuid[..12])
}

impl MockProviderGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn add_plan(&self, plan: Plan) {
        self.state().plans.push(plan);
    }

    pub fn add_customer(&self, customer: Customer) {
        let id = customer.id.clone();
        self.state().customers.insert(id, customer);
    }

    /// Add or replace a subscription, keeping provider order.
    pub fn add_subscription(&self, subscription: SubscriptionSnapshot) {
        let mut state = self.state();
        match state.subscriptions.iter_mut().find(|s| s.id == subscription.id) {
            Some(existing) => *existing = subscription,
            None => state.subscriptions.push(subscription),
        }
    }

    /// Set an error for a specific method. It persists until cleared.
    pub fn set_method_error(&self, method: &str, error: ProviderError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }

    pub fn checkout_requests(&self) -> Vec<CreateCheckoutRequest> {
        self.state().checkout_requests.clone()
    }

    pub fn subscription(&self, subscription_id: &str) -> Option<SubscriptionSnapshot> {
        self.state()
            .subscriptions
            .iter()
            .find(|s| s.id == subscription_id)
            .cloned()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });

        match state.method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProviderGateway for MockProviderGateway {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, ProviderError> {
        self.record_call(
            "create_customer",
            vec![request.user_id.to_string(), request.email.clone()],
        )?;

        let customer = Customer {
            id: mock_id("cus"),
            email: Some(request.email),
            created_at: chrono::Utc::now().timestamp(),
        };
        self.state()
            .customers
            .insert(customer.id.clone(), customer.clone());

        Ok(customer)
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, ProviderError> {
        self.record_call("get_customer", vec![customer_id.to_string()])?;
        Ok(self.state().customers.get(customer_id).cloned())
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, ProviderError> {
        self.record_call("list_plans", Vec::new())?;
        Ok(self.state().plans.clone())
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>, ProviderError> {
        self.record_call("get_plan", vec![plan_id.to_string()])?;
        Ok(self.state().plans.iter().find(|p| p.id == plan_id).cloned())
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, ProviderError> {
        self.record_call(
            "create_checkout_session",
            vec![
                request.user_id.to_string(),
                request.customer_id.clone(),
                request.plan_id.clone(),
            ],
        )?;

        let id = mock_id("cs");
        let session = CheckoutSession {
            url: format!("https://checkout.stripe.com/c/pay/{}", id),
            id,
        };
        self.state().checkout_requests.push(request);

        Ok(session)
    }

    async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
    ) -> Result<Vec<SubscriptionSnapshot>, ProviderError> {
        self.record_call(
            "list_subscriptions",
            filter.customer_id.iter().cloned().collect(),
        )?;

        Ok(self
            .state()
            .subscriptions
            .iter()
            .filter(|s| match &filter.customer_id {
                Some(customer_id) => &s.customer_id == customer_id,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionSnapshot>, ProviderError> {
        self.record_call("get_subscription", vec![subscription_id.to_string()])?;
        Ok(self.subscription(subscription_id))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, ProviderError> {
        self.record_call("cancel_subscription", vec![subscription_id.to_string()])?;

        let mut state = self.state();
        let subscription = state
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id)
            .ok_or_else(|| ProviderError::not_found("Subscription"))?;

        subscription.status = SubscriptionStatus::new(SubscriptionStatus::CANCELED);
        Ok(subscription.clone())
    }
}
