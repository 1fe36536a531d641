//! Retry/backoff policy for a single logical call.
//!
//! The controller itself is the loop in [`RpcEngine::call_with_cancel`];
//! this module holds what drives it: the transition function, the
//! retryability predicate and the backoff schedule.
//!
//! [`RpcEngine::call_with_cancel`]: super::RpcEngine::call_with_cancel

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::RpcError;

/// Daemon error codes that signal a node which is up but not ready yet.
///
/// -28 warming up, -9 not connected to peers, -10 initial block download.
pub const TRANSIENT_SERVER_CODES: &[i64] = &[-28, -9, -10];

/// Which failures are worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Retry every non-fatal failure, RPC error objects included. Matches
    /// the behavior long-running Pastel tooling has relied on.
    #[default]
    Always,
    /// Retry network failures, timeouts and the transient daemon codes in
    /// [`TRANSIENT_SERVER_CODES`]. Deterministic RPC errors and malformed
    /// responses fail at once.
    TransientOnly,
}

impl RetryPolicy {
    pub fn is_retryable(self, err: &RpcError) -> bool {
        if err.is_fatal() {
            return false;
        }
        match self {
            Self::Always => true,
            Self::TransientOnly => match err {
                RpcError::Network(_) | RpcError::Timeout(_) => true,
                RpcError::Server(server) => TRANSIENT_SERVER_CODES.contains(&server.code),
                _ => false,
            },
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("always"),
            Self::TransientOnly => f.write_str("transient"),
        }
    }
}

impl FromStr for RetryPolicy {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "transient" | "transient-only" => Ok(Self::TransientOnly),
            other => Err(RpcError::InvalidConfig(format!(
                "unknown retry policy `{other}`; expected `always` or `transient`"
            ))),
        }
    }
}

/// Wait before attempt `attempt + 1`: `base * 2^attempt`, saturating.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Sum of every backoff wait when all `max_reconnect_attempts` retries are
/// used.
pub fn total_backoff(base: Duration, max_reconnect_attempts: u32) -> Duration {
    (0..max_reconnect_attempts).fold(Duration::ZERO, |acc, n| {
        acc.saturating_add(backoff_delay(base, n))
    })
}

/// Outcome of one attempt, as seen by the controller.
///
/// A call starts in `Attempting(0)`; each attempt moves it to `Succeeded`,
/// `Retry` (i.e. `Attempting(next_attempt)` after `wait`), or `Failed`.
#[derive(Debug)]
pub enum Transition {
    Succeeded(serde_json::Value),
    Retry {
        error: RpcError,
        next_attempt: u32,
        wait: Duration,
    },
    Failed(RpcError),
}

/// Decide what follows attempt number `attempt` (zero-based).
pub fn next_transition(
    attempt: u32,
    outcome: Result<serde_json::Value, RpcError>,
    config: &EngineConfig,
) -> Transition {
    match outcome {
        Ok(value) => Transition::Succeeded(value),
        Err(error)
            if attempt < config.max_reconnect_attempts
                && config.retry_policy.is_retryable(&error) =>
        {
            Transition::Retry {
                error,
                next_attempt: attempt + 1,
                wait: backoff_delay(config.reconnect_timeout, attempt),
            }
        }
        Err(error) => Transition::Failed(error),
    }
}
