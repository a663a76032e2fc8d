use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, EnvFilter};

use subscription_sync::adapters::http::{billing_router, BillingAppState};
use subscription_sync::adapters::postgres::PostgresEntitlementStore;
use subscription_sync::adapters::stripe::{StripeProviderGateway, StripeWebhookVerifier};
use subscription_sync::application::billing::{
    EventIngester, PlanCatalog, SubscriptionCoordinator, UserLocks,
};
use subscription_sync::config::{AppConfig, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    if config.payment.is_test_mode() {
        tracing::warn!("Stripe is configured with a test-mode key");
    }

    let stripe = config.payment.stripe_config();
    let store = Arc::new(PostgresEntitlementStore::new(pool));
    let gateway = Arc::new(StripeProviderGateway::new(stripe.clone()));
    let verifier = Arc::new(StripeWebhookVerifier::new(stripe));

    let catalog = PlanCatalog::new(gateway.clone(), config.billing.tier_filter());
    let coordinator = Arc::new(SubscriptionCoordinator::new(
        store,
        gateway,
        catalog,
        Arc::new(UserLocks::new()),
        config.billing.coordinator_settings(),
    ));
    let ingester = Arc::new(EventIngester::new(verifier, coordinator.clone()));

    let state = BillingAppState {
        coordinator,
        ingester,
    };

    let app = Router::new()
        .nest("/api", billing_router())
        .with_state(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

/// Listed origins only; any origin when none are configured outside production.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() && !server.is_production() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
