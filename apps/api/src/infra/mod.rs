use secrecy::SecretString;

use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod http_client;
pub mod setup;
pub mod stripe_client;
pub mod stripe_webhook_verifier;
pub mod webhook_signer;

pub async fn postgres_persistence(
    database_url: &SecretString,
    max_connections: u32,
) -> anyhow::Result<PostgresPersistence> {
    let pool = init_db(database_url, max_connections).await?;
    let persistence = PostgresPersistence::new(pool);
    Ok(persistence)
}
