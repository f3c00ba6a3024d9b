//! HTTP client factory with consistent timeout configuration.
//!
//! Outbound adapters (payment gateway, Resend) build their `reqwest::Client`
//! here so every external call has the same connect and request timeouts.

use reqwest::Client;
use std::time::Duration;

use super::InfraError;

/// Default connect timeout (TCP handshake + TLS).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout (total request/response time).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub fn build_client() -> Result<Client, InfraError> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(InfraError::HttpClient)
}
