//! Test app state builder for HTTP-level integration testing.
//!
//! `TestAppStateBuilder` creates an `AppState` wired to in-memory repositories
//! and a real verifier keyed with `TEST_WEBHOOK_SECRET`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        ports::payment_provider::SubscriptionSource,
        use_cases::billing_webhook::BillingWebhookUseCases,
    },
    infra::{
        config::AppConfig,
        stripe_webhook_verifier::{DEFAULT_TOLERANCE_SECS, StripeWebhookVerifier},
    },
    test_utils::{InMemoryAccountRepo, InMemorySubscriptionRepo, TEST_WEBHOOK_SECRET},
};

pub fn test_config(webhook_secret: Option<&str>) -> AppConfig {
    AppConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: SecretString::new("postgres://localhost/test".into()),
        database_max_connections: 1,
        run_migrations: false,
        stripe_webhook_secret: webhook_secret.map(|s| SecretString::new(s.into())),
        stripe_secret_key: None,
        webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
        stripe_api_timeout: Duration::from_secs(1),
        log_file: "test.log".to_string(),
    }
}

pub struct TestAppStateBuilder {
    webhook_secret: Option<&'static str>,
    subscription_source: Option<Arc<dyn SubscriptionSource>>,
    accounts: Arc<InMemoryAccountRepo>,
    subscriptions: Arc<InMemorySubscriptionRepo>,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            webhook_secret: Some(TEST_WEBHOOK_SECRET),
            subscription_source: None,
            accounts: Arc::new(InMemoryAccountRepo::new()),
            subscriptions: Arc::new(InMemorySubscriptionRepo::new()),
        }
    }

    pub fn without_webhook_secret(mut self) -> Self {
        self.webhook_secret = None;
        self
    }

    pub fn with_subscription_source(mut self, source: Arc<dyn SubscriptionSource>) -> Self {
        self.subscription_source = Some(source);
        self
    }

    /// Returns the state plus handles to the repositories behind it.
    pub fn build(
        self,
    ) -> (
        AppState,
        Arc<InMemoryAccountRepo>,
        Arc<InMemorySubscriptionRepo>,
    ) {
        let config = test_config(self.webhook_secret);
        let verifier = Arc::new(StripeWebhookVerifier::new(
            config.stripe_webhook_secret.clone(),
            config.webhook_tolerance_secs,
        ));

        let use_cases = BillingWebhookUseCases::new(
            verifier,
            self.accounts.clone(),
            self.subscriptions.clone(),
            self.subscription_source,
        );

        let state = AppState {
            config: Arc::new(config),
            billing_webhook_use_cases: Arc::new(use_cases),
        };

        (state, self.accounts, self.subscriptions)
    }
}
