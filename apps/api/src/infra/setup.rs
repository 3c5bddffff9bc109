use std::fs::File;
use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::{
        ports::payment_provider::SubscriptionSource,
        use_cases::billing_webhook::{AccountRepo, BillingWebhookUseCases, SubscriptionRepo},
    },
    infra::{
        config::AppConfig, db::run_migrations, error::InfraError, postgres_persistence,
        stripe_client::StripeClient, stripe_webhook_verifier::StripeWebhookVerifier,
    },
};

/// Builds the shared state. The pool is handed back separately so the caller
/// can close it after the server drains.
pub async fn init_app_state(config: AppConfig) -> anyhow::Result<(AppState, PgPool)> {
    let postgres_arc = Arc::new(
        postgres_persistence(&config.database_url, config.database_max_connections).await?,
    );
    let pool = postgres_arc.pool().clone();

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    if config.stripe_webhook_secret.is_none() {
        warn!("STRIPE_WEBHOOK_SECRET is not set; webhook deliveries will be rejected with 500");
    }

    let subscription_source = match config.stripe_secret_key.as_ref() {
        Some(key) => {
            let client = StripeClient::new(key.clone(), config.stripe_api_timeout)
                .map_err(|e| InfraError::StripeClient(e.to_string()))?;
            Some(Arc::new(client) as Arc<dyn SubscriptionSource>)
        }
        None => {
            info!(
                "STRIPE_SECRET_KEY is not set; plan and period end will only come from \
                 subscription events"
            );
            None
        }
    };

    let verifier = Arc::new(StripeWebhookVerifier::new(
        config.stripe_webhook_secret.clone(),
        config.webhook_tolerance_secs,
    ));

    let billing_webhook_use_cases = BillingWebhookUseCases::new(
        verifier,
        postgres_arc.clone() as Arc<dyn AccountRepo>,
        postgres_arc.clone() as Arc<dyn SubscriptionRepo>,
        subscription_source,
    );

    let state = AppState {
        config: Arc::new(config),
        billing_webhook_use_cases: Arc::new(billing_webhook_use_cases),
    };

    Ok((state, pool))
}

pub fn init_tracing(log_file: &str) -> Result<(), InfraError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "newsletter_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create(log_file).map_err(|source| InfraError::LogFile {
        path: log_file.to_string(),
        source,
    })?;
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();

    Ok(())
}
