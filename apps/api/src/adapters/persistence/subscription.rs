use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing_webhook::{
        SubscriptionRepo, SubscriptionUpdate, UpsertSubscriptionInput,
    },
    domain::entities::subscription::Subscription,
};

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        account_id: row.get("account_id"),
        stripe_customer_id: row.get("stripe_customer_id"),
        stripe_subscription_id: row.get("stripe_subscription_id"),
        plan: row.get("plan"),
        status: row.get("status"),
        current_period_end: row.get("current_period_end"),
        cancel_at_period_end: row.get("cancel_at_period_end"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const RETURNING_COLS: &str = r#"
    account_id, stripe_customer_id, stripe_subscription_id, plan, status,
    current_period_end, cancel_at_period_end, created_at, updated_at
"#;

/// Shared SET clause for event-driven updates. `NULL` binds keep the stored value.
const UPDATE_SET: &str = r#"
    stripe_subscription_id = $1,
    stripe_customer_id = COALESCE($2, stripe_customer_id),
    plan = COALESCE($3, plan),
    status = $4,
    current_period_end = COALESCE($5, current_period_end),
    cancel_at_period_end = $6,
    updated_at = NOW()
"#;

const BY_SUBSCRIPTION_ID: &str = "stripe_subscription_id = $7";

/// A single row for the customer that is not yet bound to a subscription.
const UNBOUND_BY_CUSTOMER_ID: &str = r#"
    account_id = (
        SELECT account_id FROM subscriptions
        WHERE stripe_customer_id = $7 AND stripe_subscription_id IS NULL
        ORDER BY updated_at DESC
        LIMIT 1
    )
"#;

impl PostgresPersistence {
    /// `predicate` binds the lookup key as `$7`.
    async fn update_subscription_where(
        &self,
        predicate: &str,
        key: &str,
        update: &SubscriptionUpdate,
    ) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "UPDATE subscriptions SET {} WHERE {} RETURNING {}",
            UPDATE_SET, predicate, RETURNING_COLS
        ))
        .bind(&update.stripe_subscription_id)
        .bind(&update.stripe_customer_id)
        .bind(&update.plan)
        .bind(update.status)
        .bind(update.current_period_end)
        .bind(update.cancel_at_period_end)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn upsert_for_account(&self, input: &UpsertSubscriptionInput) -> AppResult<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (
                account_id, stripe_customer_id, stripe_subscription_id, plan, status,
                current_period_end, cancel_at_period_end
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (account_id) DO UPDATE SET
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                stripe_subscription_id = EXCLUDED.stripe_subscription_id,
                plan = EXCLUDED.plan,
                status = EXCLUDED.status,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                updated_at = NOW()
            RETURNING {}
            "#,
            RETURNING_COLS
        ))
        .bind(input.account_id)
        .bind(&input.stripe_customer_id)
        .bind(&input.stripe_subscription_id)
        .bind(&input.plan)
        .bind(input.status)
        .bind(input.current_period_end)
        .bind(input.cancel_at_period_end)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_subscription(&row))
    }

    async fn update_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> AppResult<Option<Subscription>> {
        self.update_subscription_where(BY_SUBSCRIPTION_ID, stripe_subscription_id, update)
            .await
    }

    async fn update_unbound_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
        update: &SubscriptionUpdate,
    ) -> AppResult<Option<Subscription>> {
        self.update_subscription_where(UNBOUND_BY_CUSTOMER_ID, stripe_customer_id, update)
            .await
    }
}
