//! Outbound HTTP transport.

use std::time::Duration;

use color_eyre::eyre::WrapErr as _;
use reqwest::header::{AUTHORIZATION, HeaderValue, RETRY_AFTER, USER_AGENT};

use super::wire::GcmRequest;
use crate::TransportError;

/// Status, retry hint and body of a provider reply.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed `retry-after` header.
    pub retry_after: Option<Duration>,
    pub body: String,
}

/// Performs a single provider call.
#[trait_variant::make(Send)]
pub trait GcmTransport: Send + Sync {
    async fn send(&self, request: &GcmRequest) -> Result<TransportResponse, TransportError>;
}

/// Transport backed by a pooled `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: String,
    authorization: HeaderValue,
}

impl ReqwestTransport {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        timeout: Duration,
        max_connections: usize,
    ) -> color_eyre::eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(max_connections)
            .build()
            .wrap_err("failed to build HTTP client")?;

        let mut authorization = HeaderValue::from_str(&format!("key={}", api_key))
            .wrap_err("API key is not a valid header value")?;
        authorization.set_sensitive(true);

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            authorization,
        })
    }
}

impl GcmTransport for ReqwestTransport {
    async fn send(&self, request: &GcmRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(USER_AGENT, "pushgate")
            .header(AUTHORIZATION, self.authorization.clone())
            .json(request)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
        let body = response.text().await.map_err(request_error)?;

        Ok(TransportResponse {
            status,
            retry_after,
            body,
        })
    }
}

fn request_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(e.to_string())
    }
}

/// Parse a `retry-after` header given in whole seconds.
pub fn parse_retry_after(value: Option<&HeaderValue>) -> Option<Duration> {
    let secs = value?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}
