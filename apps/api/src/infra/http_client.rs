//! HTTP client factory with consistent timeout configuration.
//!
//! Outbound clients (currently only the Stripe API client) are built here so
//! every external call is bounded.

use reqwest::Client;
use std::time::Duration;

/// Default connect timeout (TCP handshake + TLS).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout (total request/response time).
///
/// Webhook deliveries wait on these calls, so keep this well under Stripe's
/// own delivery timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build an HTTP client with the given request timeout.
pub fn try_build_client(request_timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(request_timeout))
        .timeout(request_timeout)
        .build()
}
