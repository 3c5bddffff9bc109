use std::sync::Arc;

use crate::{
    application::use_cases::billing_webhook::BillingWebhookUseCases, infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub billing_webhook_use_cases: Arc<BillingWebhookUseCases>,
}
