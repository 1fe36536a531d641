use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{self, HeaderValue};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::RpcError;
use crate::rpc::protocol::{CallEnvelope, RawResponse};
use crate::rpc::Transport;

use super::connection::Endpoint;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One-shot HTTP POST transport for a single daemon endpoint.
///
/// Holds no per-call state; retries and backoff live in the engine.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    authorization: HeaderValue,
    request_timeout: Duration,
    limiter: Option<DirectRateLimiter>,
}

impl HttpTransport {
    /// Build a transport for `endpoint` using the timeout and optional
    /// request rate from `config`.
    pub fn new(endpoint: &Endpoint, config: &EngineConfig) -> Result<Self, RpcError> {
        config.validate()?;
        let authorization = endpoint.authorization_value()?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout.min(Duration::from_secs(10)))
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RpcError::InvalidConfig(format!("build HTTP client: {e}")))?;

        let limiter = config
            .requests_per_second
            .map(|limit| RateLimiter::direct(Quota::per_second(limit)));

        Ok(Self {
            client,
            url: endpoint.url(),
            authorization,
            request_timeout: config.request_timeout,
            limiter,
        })
    }

    /// Credential-free request target.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> RpcError {
        if err.is_timeout() {
            RpcError::Timeout(self.request_timeout)
        } else {
            RpcError::network(err.without_url())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn send(&self, envelope: &CallEnvelope) -> Result<RawResponse, RpcError> {
        let response = self
            .client
            .post(&self.url)
            .header(header::AUTHORIZATION, self.authorization.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(envelope.to_body()?)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let status = response.status();

        let body = response.text().await.map_err(|e| self.classify(e))?;
        debug!(
            rpc.id = envelope.id,
            rpc.method = %envelope.method,
            %status,
            body_len = body.len(),
            "rpc response"
        );
        trace!(rpc.id = envelope.id, body = %body, "rpc response body");

        Ok(RawResponse::new(status.as_u16(), body))
    }
}
