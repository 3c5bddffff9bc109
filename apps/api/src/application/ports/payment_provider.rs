use async_trait::async_trait;

use crate::{
    app_error::AppResult,
    domain::entities::inbound_event::{InboundEvent, SubscriptionObject},
};

/// Turns a raw, signed webhook request into a trusted event.
///
/// Implementations must fail with `AppError::Configuration` when no signing
/// secret is available, before inspecting the signature, and with
/// `AppError::Authenticity` for any missing, malformed, stale or mismatched
/// signature. Nothing past this boundary sees an unverified payload.
pub trait EventVerifier: Send + Sync {
    fn verify(&self, payload: &[u8], signature_header: Option<&str>) -> AppResult<InboundEvent>;
}

/// Read-only access to the provider's subscription objects.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn fetch_subscription(&self, subscription_id: &str) -> AppResult<SubscriptionObject>;
}
