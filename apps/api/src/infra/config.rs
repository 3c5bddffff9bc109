use std::net::SocketAddr;
use std::time::Duration;

use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

use crate::infra::{
    http_client::DEFAULT_REQUEST_TIMEOUT, stripe_webhook_verifier::DEFAULT_TOLERANCE_SECS,
};

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: SecretString,
    pub database_max_connections: u32,
    /// Apply `migrations/` on startup.
    pub run_migrations: bool,
    /// Signing secret for inbound webhooks. When absent the webhook endpoint
    /// answers 500 instead of verifying anything.
    pub stripe_webhook_secret: Option<SecretString>,
    /// Enables fetching subscription details from the Stripe API after checkout.
    pub stripe_secret_key: Option<SecretString>,
    pub webhook_tolerance_secs: i64,
    pub stripe_api_timeout: Duration,
    pub log_file: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)));
        let database_url = SecretString::new(get_env::<String>("DATABASE_URL").into());
        let database_max_connections: u32 = get_env_default("DATABASE_MAX_CONNECTIONS", 5);
        let run_migrations: bool = get_env_default("RUN_MIGRATIONS", true);
        let stripe_webhook_secret = optional_secret("STRIPE_WEBHOOK_SECRET");
        let stripe_secret_key = optional_secret("STRIPE_SECRET_KEY");
        let webhook_tolerance_secs: i64 =
            get_env_default("WEBHOOK_TOLERANCE_SECS", DEFAULT_TOLERANCE_SECS);
        let stripe_api_timeout_secs: u64 =
            get_env_default("STRIPE_API_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT.as_secs());
        let log_file: String = get_env_default("LOG_FILE", "app.log".to_string());

        Self {
            bind_addr,
            database_url,
            database_max_connections,
            run_migrations,
            stripe_webhook_secret,
            stripe_secret_key,
            webhook_tolerance_secs,
            stripe_api_timeout: Duration::from_secs(stripe_api_timeout_secs),
            log_file,
        }
    }
}

fn optional_secret(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| SecretString::new(v.into()))
}
