//! PlanCatalog - Purchasable plans as read from the provider.

use std::sync::Arc;

use crate::domain::billing::{BillingError, CatalogPlan, Plan, PlanTierFilter};
use crate::ports::ProviderGateway;

/// Reads plans from the provider and applies the pricing-tier policy.
///
/// Every call goes to the provider; nothing is cached.
#[derive(Clone)]
pub struct PlanCatalog {
    gateway: Arc<dyn ProviderGateway>,
    filter: PlanTierFilter,
}

impl PlanCatalog {
    pub fn new(gateway: Arc<dyn ProviderGateway>, filter: PlanTierFilter) -> Self {
        Self { gateway, filter }
    }

    /// Lists the plans whose display price matches the tier marker, in provider order.
    pub async fn list_plans(&self) -> Result<Vec<CatalogPlan>, BillingError> {
        let plans = self.gateway.list_plans().await?;
        let total = plans.len();

        let listed: Vec<CatalogPlan> = plans
            .into_iter()
            .map(CatalogPlan::from)
            .filter(|plan| self.filter.includes(plan))
            .collect();

        tracing::debug!(
            total,
            listed = listed.len(),
            marker = %self.filter.marker(),
            "Plan catalog filtered"
        );

        Ok(listed)
    }

    /// Fetches one plan.
    pub async fn get_plan(&self, plan_id: &str) -> Result<Plan, BillingError> {
        self.gateway
            .get_plan(plan_id)
            .await
            .map_err(|e| e.into_billing(|| BillingError::plan_not_found(plan_id)))?
            .ok_or_else(|| BillingError::plan_not_found(plan_id))
    }
}
