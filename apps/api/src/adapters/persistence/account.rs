use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing_webhook::AccountRepo,
    domain::entities::account::Account,
};

/// Served by `idx_accounts_email_lower`.
const SELECT_BY_EMAIL: &str =
    "SELECT id, email, created_at FROM accounts WHERE lower(email) = lower($1) LIMIT 2";

fn row_to_account(row: &sqlx::postgres::PgRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl AccountRepo for PostgresPersistence {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        // Two rows are enough to detect ambiguity.
        let rows = sqlx::query(SELECT_BY_EMAIL)
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;

        match rows.as_slice() {
            [] => Ok(None),
            [row] => Ok(Some(row_to_account(row))),
            _ => Err(AppError::DuplicateAccount {
                email: email.to_string(),
            }),
        }
    }

    async fn find_or_create_by_email(&self, email: &str) -> AppResult<Account> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (email)
            VALUES ($1)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING id, email, created_at
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_account(&row))
    }
}
