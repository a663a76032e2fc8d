//! PostgreSQL implementation of EntitlementStore.
//!
//! Reads and writes the billing columns of the `users` table. Writes are guarded
//! in SQL so a concurrent writer can never reassign a customer id or leave a
//! subscription without a customer.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::billing::{BillingUser, SubscriptionLink};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::EntitlementStore;

const SELECT_USER: &str = r#"
    SELECT id, email, name, phone, role, customer_id, subscription_id, plan_id
    FROM users
"#;

/// PostgreSQL implementation of the EntitlementStore port.
pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        predicate: &str,
        value: &str,
    ) -> Result<Option<BillingUser>, DomainError> {
        let sql = format!("{} WHERE {} ORDER BY id LIMIT 1", SELECT_USER, predicate);

        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(BillingUser::try_from).transpose()
    }

    /// Explains why a guarded update matched no row.
    async fn rejected_write(
        &self,
        user_id: &UserId,
        customer_id: Option<&str>,
    ) -> DomainError {
        let current = match self.find_user_by_id(user_id).await {
            Ok(current) => current,
            Err(err) => return err,
        };

        match current {
            None => DomainError::new(ErrorCode::NotFound, format!("User {} not found", user_id))
                .with_detail("user_id", user_id.as_str()),
            Some(user) if customer_id.is_some_and(|c| !user.accepts_customer(c)) => {
                DomainError::new(
                    ErrorCode::Conflict,
                    format!("User {} is already linked to another customer", user_id),
                )
            }
            Some(_) => DomainError::new(
                ErrorCode::InvariantViolation,
                "Subscription requires a customer id",
            ),
        }
    }
}

/// Database row representation of a user's billing slice.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    phone: Option<String>,
    role: String,
    customer_id: Option<String>,
    subscription_id: Option<String>,
    plan_id: Option<String>,
}

impl TryFrom<UserRow> for BillingUser {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = UserId::new(row.id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid user id: {}", e))
        })?;

        let subscription = match (row.subscription_id, row.plan_id) {
            (Some(subscription_id), Some(plan_id)) => {
                Some(SubscriptionLink::new(subscription_id, plan_id))
            }
            (None, None) => None,
            _ => {
                return Err(DomainError::new(
                    ErrorCode::InvariantViolation,
                    format!("User {} has a subscription id without a plan id", id),
                ))
            }
        };

        Ok(BillingUser {
            id,
            email: row.email,
            name: row.name,
            phone: row.phone,
            role: row.role,
            customer_id: row.customer_id,
            subscription,
        })
    }
}

fn db_error(e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Entitlement store query failed: {}", e))
}

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<BillingUser>, DomainError> {
        self.fetch_one_where("id = $1", user_id.as_str()).await
    }

    async fn find_user_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<BillingUser>, DomainError> {
        self.fetch_one_where("customer_id = $1", customer_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<BillingUser>, DomainError> {
        self.fetch_one_where("lower(email) = lower($1)", email).await
    }

    async fn set_customer_id(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET customer_id = $2
            WHERE id = $1
              AND (customer_id IS NULL OR customer_id = $2)
            "#,
        )
        .bind(user_id.as_str())
        .bind(customer_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(self.rejected_write(user_id, Some(customer_id)).await);
        }

        Ok(())
    }

    async fn set_entitlement(
        &self,
        user_id: &UserId,
        customer_id: Option<&str>,
        subscription: Option<&SubscriptionLink>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET customer_id = COALESCE($2, customer_id),
                subscription_id = $3,
                plan_id = $4
            WHERE id = $1
              AND ($2::text IS NULL OR customer_id IS NULL OR customer_id = $2)
              AND ($3::text IS NULL OR COALESCE($2, customer_id) IS NOT NULL)
            "#,
        )
        .bind(user_id.as_str())
        .bind(customer_id)
        .bind(subscription.map(|s| s.subscription_id.as_str()))
        .bind(subscription.map(|s| s.plan_id.as_str()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(self.rejected_write(user_id, customer_id).await);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> UserRow {
        UserRow {
            id: "u1".to_string(),
            email: "a@x.com".to_string(),
            name: "Ada".to_string(),
            phone: None,
            role: "user".to_string(),
            customer_id: Some("cus_1".to_string()),
            subscription_id: Some("sub_1".to_string()),
            plan_id: Some("plan_1".to_string()),
        }
    }

    #[test]
    fn row_maps_to_user_with_link() {
        let user = BillingUser::try_from(row()).unwrap();
        assert_eq!(user.subscription_id(), Some("sub_1"));
        assert_eq!(user.plan_id(), Some("plan_1"));
        assert!(user.entitlement_is_consistent());
    }

    #[test]
    fn row_without_entitlement_maps_to_none() {
        let user = BillingUser::try_from(UserRow {
            subscription_id: None,
            plan_id: None,
            ..row()
        })
        .unwrap();
        assert!(user.subscription.is_none());
    }

    #[test]
    fn half_written_link_is_rejected() {
        let err = BillingUser::try_from(UserRow {
            plan_id: None,
            ..row()
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvariantViolation);
    }

    #[test]
    fn empty_id_is_database_error() {
        let err = BillingUser::try_from(UserRow {
            id: String::new(),
            ..row()
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
