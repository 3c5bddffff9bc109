use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use crate::infra::error::InfraError;

pub async fn init_db(
    database_url: &SecretString,
    max_connections: u32,
) -> Result<PgPool, InfraError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url.expose_secret())
        .await
        .map_err(InfraError::DatabaseConnection)?;

    info!(max_connections, "Connected to database!");
    Ok(pool)
}

/// Applies `apps/api/migrations` in order. Already-applied migrations are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), InfraError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(InfraError::Migration)?;

    info!("Database migrations applied");
    Ok(())
}
