use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::EngineConfig;
use crate::error::RpcError;

use super::http_adapter::{Endpoint, HttpTransport};
use super::protocol::{decode_response, CallEnvelope};
use super::retry::{next_transition, Transition};
use super::Transport;

// ==============================================================================
// RpcEngine: one logical call at a time, retried with exponential backoff
// ==============================================================================

/// Issues JSON-RPC calls through a [`Transport`], retrying failures per the
/// configured [`RetryPolicy`](super::RetryPolicy).
///
/// Share it behind an `Arc` to call from many tasks: request ids come from
/// an atomic counter, everything else is read-only.
pub struct RpcEngine<T = HttpTransport> {
    transport: T,
    config: EngineConfig,
    service_name: Option<String>,
    /// Next request id. Starts at 1 and advances once per logical call.
    next_id: AtomicU64,
}

impl RpcEngine<HttpTransport> {
    /// Engine talking HTTP to `endpoint`.
    pub fn connect(endpoint: &Endpoint, config: EngineConfig) -> Result<Self, RpcError> {
        let transport = HttpTransport::new(endpoint, &config)?;
        debug!(url = transport.url(), "rpc engine ready");
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> RpcEngine<T> {
    /// Engine over any transport. `config` is validated when a call starts.
    pub fn with_transport(transport: T, config: EngineConfig) -> Self {
        Self {
            transport,
            config,
            service_name: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Prefix every method as `service_name.method`.
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Frame a call and claim its request id.
    pub fn encode(&self, method: &str, params: Vec<Value>) -> CallEnvelope {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        CallEnvelope::new(id, self.service_name.as_deref(), method, params)
    }

    /// Call `method` with positional `params`.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.call_with_cancel(method, params, &CancellationToken::new())
            .await
    }

    /// Like [`call`](Self::call), but `cancel` aborts the in-flight request
    /// or backoff sleep and fails the call with [`RpcError::Cancelled`].
    pub async fn call_with_cancel(
        &self,
        method: &str,
        params: Vec<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, RpcError> {
        self.config.validate()?;
        let envelope = self.encode(method, params);
        debug!(
            rpc.id = envelope.id,
            rpc.method = %envelope.method,
            rpc.params = envelope.params.len(),
            "rpc call"
        );

        let mut attempt = 0;
        loop {
            let outcome = self.attempt(&envelope, cancel).await;
            match next_transition(attempt, outcome, &self.config) {
                Transition::Succeeded(value) => return Ok(value),
                Transition::Retry {
                    error,
                    next_attempt,
                    wait,
                } => {
                    warn!(
                        rpc.id = envelope.id,
                        rpc.method = %envelope.method,
                        attempt = attempt + 1,
                        max_attempts = self.config.max_reconnect_attempts + 1,
                        wait_ms = wait.as_millis() as u64,
                        %error,
                        "rpc attempt failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RpcError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                    attempt = next_attempt;
                }
                Transition::Failed(RpcError::Cancelled) => return Err(RpcError::Cancelled),
                Transition::Failed(error) => {
                    error!(
                        rpc.id = envelope.id,
                        rpc.method = %envelope.method,
                        attempts = attempt + 1,
                        %error,
                        "rpc call failed"
                    );
                    return Err(error);
                }
            }
        }
    }

    /// One transport exchange plus decoding. Only the exchange itself is
    /// bounded by the request timeout.
    async fn attempt(
        &self,
        envelope: &CallEnvelope,
        cancel: &CancellationToken,
    ) -> Result<Value, RpcError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RpcError::Cancelled),
            _ = self.transport.ready() => {}
        }

        let timeout = self.config.request_timeout;
        let exchange = tokio::time::timeout(timeout, self.transport.send(envelope));

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RpcError::Cancelled),
            sent = exchange => sent.map_err(|_| RpcError::Timeout(timeout))??,
        };
        decode_response(envelope.id, &raw)
    }
}
