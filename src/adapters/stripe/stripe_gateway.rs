//! Stripe provider gateway.
//!
//! Implements `ProviderGateway` over the Stripe REST API with form-encoded requests
//! and basic auth on the secret key.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret);
//! let gateway = StripeProviderGateway::new(config);
//! ```

use std::future::Future;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::domain::billing::{Plan, SubscriptionSnapshot};
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, ProviderError,
    ProviderErrorCode, ProviderGateway, SubscriptionFilter,
};

use super::wire_types::{
    StripeCheckoutSession, StripeCustomer, StripeList, StripePlan, StripeSubscription,
};

/// Page size for list endpoints (Stripe's maximum).
const PAGE_LIMIT: &str = "100";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    pub(super) api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    pub(super) webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    pub(super) api_base_url: String,

    /// Whether to reject test mode events.
    pub(super) require_livemode: bool,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            require_livemode: false,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

/// Stripe implementation of `ProviderGateway`.
pub struct StripeProviderGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeProviderGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url, path)
    }

    /// `/v1/{collection}/{id}` with `id` percent-encoded as one path segment.
    ///
    /// Ids come from callers, so `/`, `?` and `#` must not reach the request line.
    fn object_url(&self, collection: &str, id: &str) -> Result<reqwest::Url, ProviderError> {
        // The url crate drops dot segments on push
        if id.is_empty() || id == "." || id == ".." {
            return Err(ProviderError::not_found(collection));
        }

        let mut url = reqwest::Url::parse(&self.url(collection)).map_err(|e| {
            ProviderError::new(ProviderErrorCode::InvalidRequest, format!("Bad Stripe URL: {}", e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::new(ProviderErrorCode::InvalidRequest, "Stripe URL has no path")
            })?
            .push(id);
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<reqwest::Response, ProviderError> {
        request
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(operation, error = %e, "Stripe request failed");
                ProviderError::network(e.to_string())
            })
    }

    /// GET a single object; 404 becomes `None`.
    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
        operation: &'static str,
    ) -> Result<Option<T>, ProviderError> {
        let url = match self.object_url(collection, id) {
            Ok(url) => url,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let response = self.send(self.http_client.get(url), operation).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        read_json(response, operation).await.map(Some)
    }

    /// Walks a list endpoint to the end.
    async fn fetch_all<T>(
        &self,
        path: &'static str,
        filters: Vec<(&'static str, String)>,
        operation: &'static str,
        cursor_of: fn(&T) -> &str,
    ) -> Result<Vec<T>, ProviderError>
    where
        T: DeserializeOwned,
    {
        collect_pages(cursor_of, |starting_after| {
            let mut query = filters.clone();
            query.push(("limit", PAGE_LIMIT.to_string()));
            if let Some(cursor) = starting_after {
                query.push(("starting_after", cursor));
            }
            let request = self.http_client.get(self.url(path)).query(&query);
            async move {
                let response = self.send(request, operation).await?;
                read_json::<StripeList<T>>(response, operation).await
            }
        })
        .await
    }
}

/// Follows `has_more` / `starting_after` until the listing is exhausted.
async fn collect_pages<T, F, Fut>(
    cursor_of: fn(&T) -> &str,
    mut fetch_page: F,
) -> Result<Vec<T>, ProviderError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<StripeList<T>, ProviderError>>,
{
    let mut items = Vec::new();
    let mut starting_after = None;

    loop {
        let page = fetch_page(starting_after.take()).await?;
        let next = if page.has_more {
            page.data.last().map(|last| cursor_of(last).to_string())
        } else {
            None
        };
        items.extend(page.data);

        match next {
            Some(cursor) => starting_after = Some(cursor),
            None => return Ok(items),
        }
    }
}

/// Maps a non-2xx status to a provider error, otherwise parses the body.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<T, ProviderError> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(operation, status = %status, error = %error_text, "Stripe API error");

        let code = match status {
            reqwest::StatusCode::NOT_FOUND => ProviderErrorCode::NotFound,
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                ProviderErrorCode::AuthenticationError
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => ProviderErrorCode::RateLimitExceeded,
            s if s.is_client_error() => ProviderErrorCode::InvalidRequest,
            _ => ProviderErrorCode::ProviderError,
        };
        return Err(ProviderError::new(
            code,
            format!("Stripe API error ({}): {}", status.as_u16(), error_text),
        ));
    }

    response.json().await.map_err(|e| {
        ProviderError::invalid_response(format!("Failed to parse Stripe response: {}", e))
    })
}

fn subscription_id(sub: &StripeSubscription) -> &str {
    &sub.id
}

fn plan_id(plan: &StripePlan) -> &str {
    &plan.id
}

#[async_trait]
impl ProviderGateway for StripeProviderGateway {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, ProviderError> {
        let mut params = vec![
            ("email", request.email.clone()),
            ("metadata[user_id]", request.user_id.to_string()),
        ];
        if let Some(name) = &request.name {
            params.push(("name", name.clone()));
        }

        let response = self
            .send(
                self.http_client.post(self.url("customers")).form(&params),
                "create_customer",
            )
            .await?;
        let customer: StripeCustomer = read_json(response, "create_customer").await?;

        tracing::info!(
            user_id = %request.user_id,
            customer_id = %customer.id,
            "Stripe customer created"
        );

        Ok(Customer {
            id: customer.id,
            email: customer.email.or(Some(request.email)),
            created_at: customer.created,
        })
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, ProviderError> {
        let customer: Option<StripeCustomer> = self
            .fetch_optional("customers", customer_id, "get_customer")
            .await?;

        Ok(customer.filter(|c| !c.deleted).map(|c| Customer {
            id: c.id,
            email: c.email,
            created_at: c.created,
        }))
    }

    async fn list_plans(&self) -> Result<Vec<Plan>, ProviderError> {
        self.fetch_all::<StripePlan>("plans", Vec::new(), "list_plans", plan_id)
            .await?
            .into_iter()
            .map(StripePlan::into_plan)
            .collect()
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>, ProviderError> {
        let plan: Option<StripePlan> = self
            .fetch_optional("plans", plan_id, "get_plan")
            .await?;
        plan.map(StripePlan::into_plan).transpose()
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, ProviderError> {
        let params = vec![
            ("mode", "subscription".to_string()),
            ("customer", request.customer_id),
            ("line_items[0][price]", request.plan_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("metadata[user_id]", request.user_id.to_string()),
            ("metadata[plan_id]", request.plan_id),
        ];

        let response = self
            .send(
                self.http_client
                    .post(self.url("checkout/sessions"))
                    .form(&params),
                "create_checkout_session",
            )
            .await?;
        let session: StripeCheckoutSession = read_json(response, "create_checkout_session").await?;

        let url = session.url.ok_or_else(|| {
            ProviderError::invalid_response("Checkout session response has no url")
        })?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn list_subscriptions(
        &self,
        filter: SubscriptionFilter,
    ) -> Result<Vec<SubscriptionSnapshot>, ProviderError> {
        let mut filters = vec![("status", "all".to_string())];
        if let Some(customer_id) = filter.customer_id {
            filters.push(("customer", customer_id));
        }

        self.fetch_all::<StripeSubscription>(
            "subscriptions",
            filters,
            "list_subscriptions",
            subscription_id,
        )
        .await?
        .into_iter()
        .map(StripeSubscription::into_snapshot)
        .collect()
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionSnapshot>, ProviderError> {
        let sub: Option<StripeSubscription> = self
            .fetch_optional("subscriptions", subscription_id, "get_subscription")
            .await?;
        sub.map(StripeSubscription::into_snapshot).transpose()
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, ProviderError> {
        let url = self.object_url("subscriptions", subscription_id)?;
        let response = self
            .send(self.http_client.delete(url), "cancel_subscription")
            .await?;
        let sub: StripeSubscription = read_json(response, "cancel_subscription").await?;

        tracing::info!(subscription_id = %sub.id, status = %sub.status, "Stripe subscription canceled");

        sub.into_snapshot()
    }
}
