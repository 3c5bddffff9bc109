//! Stripe-style webhook signing: HMAC-SHA256 over `"<timestamp>.<raw body>"`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Raw MAC bytes for `body` signed at `timestamp`.
pub fn compute_signature(secret: &[u8], timestamp: i64, body: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

/// Builds a `stripe-signature` header value for `body`. Used to replay
/// captured events against a local instance and in tests.
pub fn sign_stripe_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let signature = hex::encode(compute_signature(secret.as_bytes(), timestamp, body));
    format!("t={},v1={}", timestamp, signature)
}
