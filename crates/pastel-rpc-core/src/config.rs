use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::RpcError;
use crate::rpc::retry::{total_backoff, RetryPolicy};

// ==============================================================================
// Engine Configuration
// ==============================================================================

pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 2;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Retry and timeout settings, fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Base backoff; the wait before retry `n + 1` is `reconnect_timeout * 2^n`.
    pub reconnect_timeout: Duration,
    /// Retries after the first attempt, so at most this plus one attempts.
    pub max_reconnect_attempts: u32,
    /// Hard bound on each individual attempt.
    pub request_timeout: Duration,
    pub retry_policy: RetryPolicy,
    /// Outbound HTTP requests per second; `None` disables limiting.
    pub requests_per_second: Option<NonZeroU32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            requests_per_second: None,
        }
    }
}

impl EngineConfig {
    /// Build from whole seconds, the unit deployments configure.
    pub fn from_secs(
        reconnect_timeout_secs: u64,
        max_reconnect_attempts: u32,
        request_timeout_secs: u64,
    ) -> Self {
        Self {
            reconnect_timeout: Duration::from_secs(reconnect_timeout_secs),
            max_reconnect_attempts,
            request_timeout: Duration::from_secs(request_timeout_secs),
            ..Self::default()
        }
    }

    pub fn with_reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_timeout = timeout;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_requests_per_second(mut self, limit: Option<NonZeroU32>) -> Self {
        self.requests_per_second = limit;
        self
    }

    pub fn validate(&self) -> Result<(), RpcError> {
        if self.request_timeout.is_zero() {
            return Err(RpcError::InvalidConfig(
                "request timeout must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Worst-case wall clock before a call reports failure: every backoff
    /// wait plus a full timeout on every attempt.
    pub fn worst_case_duration(&self) -> Duration {
        let attempts = self.max_reconnect_attempts.saturating_add(1);
        total_backoff(self.reconnect_timeout, self.max_reconnect_attempts)
            .saturating_add(self.request_timeout.saturating_mul(attempts))
    }
}
