//! Inbound Stripe webhook endpoint.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use serde::Serialize;

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
struct WebhookAck {
    received: bool,
}

/// POST /api/webhooks/stripe (also mounted at /api/stripe/webhook)
///
/// The body is taken as raw bytes: the signature covers the exact bytes sent.
async fn handle_stripe_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    app_state
        .billing_webhook_use_cases
        .handle(&body, signature)
        .await?;

    Ok((StatusCode::OK, Json(WebhookAck { received: true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/stripe", post(handle_stripe_webhook))
        .route("/stripe/webhook", post(handle_stripe_webhook))
}
