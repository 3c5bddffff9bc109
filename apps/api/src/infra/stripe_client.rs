use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::SubscriptionSource,
    domain::entities::inbound_event::SubscriptionObject,
    infra::http_client::try_build_client,
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: SecretString, request_timeout: Duration) -> AppResult<Self> {
        let client = try_build_client(request_timeout)
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            secret_key,
            api_base: STRIPE_API_BASE.to_string(),
        })
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub async fn get_subscription(&self, subscription_id: &str) -> AppResult<SubscriptionObject> {
        let response = self
            .client
            .get(format!("{}/subscriptions/{}", self.api_base, subscription_id))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Stripe API error");

            if let Ok(error) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(AppError::Provider(format!(
                    "Stripe error: {}",
                    error.error.message.unwrap_or(error.error.error_type)
                )));
            }

            return Err(AppError::Provider(format!(
                "Stripe API error: {} - {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Stripe response");
            AppError::Provider(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl SubscriptionSource for StripeClient {
    async fn fetch_subscription(&self, subscription_id: &str) -> AppResult<SubscriptionObject> {
        self.get_subscription(subscription_id).await
    }
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Deserialize)]
pub struct StripeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
}
