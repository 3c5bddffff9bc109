//! Stripe webhook signature verification.
//!
//! Header format: `t=<unix-ts>,v1=<hex hmac>[,v1=...][,v0=...]`. The signed
//! content is `"<t>.<raw body>"` under HMAC-SHA256 with the endpoint's signing secret.

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::EventVerifier,
    domain::entities::inbound_event::{EventEnvelope, InboundEvent},
    infra::webhook_signer::compute_signature,
};

/// Stripe SDK default replay window.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Allowed clock skew for timestamps from the future.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> AppResult<Self> {
        let mut timestamp: Option<&str> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => timestamp = Some(value),
                // Undecodable entries cannot match; skip them like unknown schemes.
                "v1" => {
                    if let Ok(sig) = hex::decode(value) {
                        v1_signatures.push(sig);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| AppError::Authenticity("Missing timestamp in signature".into()))?
            .parse::<i64>()
            .map_err(|_| AppError::Authenticity("Invalid timestamp".into()))?;

        if v1_signatures.is_empty() {
            return Err(AppError::Authenticity("Missing signature".into()));
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

pub struct StripeWebhookVerifier {
    secret: Option<SecretString>,
    tolerance_secs: i64,
}

impl StripeWebhookVerifier {
    pub fn new(secret: Option<SecretString>, tolerance_secs: i64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    fn verify_at(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        now: i64,
    ) -> AppResult<InboundEvent> {
        let Some(secret) = self.secret.as_ref() else {
            tracing::error!(
                "STRIPE_WEBHOOK_SECRET is not configured; rejecting webhook before verification"
            );
            return Err(AppError::Configuration(
                "Webhook signing secret is not configured".into(),
            ));
        };

        let signature_header = signature_header
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| AppError::Authenticity("Missing Stripe signature".into()))?;

        let header = SignatureHeader::parse(signature_header)?;

        let expected =
            compute_signature(secret.expose_secret().as_bytes(), header.timestamp, payload);
        let matched = header
            .v1_signatures
            .iter()
            .any(|sig| bool::from(sig.as_slice().ct_eq(expected.as_slice())));
        if !matched {
            return Err(AppError::Authenticity("Invalid signature".into()));
        }

        let age = now - header.timestamp;
        if age > self.tolerance_secs {
            return Err(AppError::Authenticity("Timestamp too old".into()));
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(AppError::Authenticity("Timestamp in the future".into()));
        }

        let envelope: EventEnvelope = serde_json::from_slice(payload)
            .map_err(|e| AppError::InvalidPayload(e.to_string()))?;
        InboundEvent::from_envelope(envelope).map_err(|e| AppError::InvalidPayload(e.to_string()))
    }
}

impl EventVerifier for StripeWebhookVerifier {
    fn verify(&self, payload: &[u8], signature_header: Option<&str>) -> AppResult<InboundEvent> {
        self.verify_at(payload, signature_header, chrono::Utc::now().timestamp())
    }
}
