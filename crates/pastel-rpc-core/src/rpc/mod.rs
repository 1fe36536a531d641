//! Resilient JSON-RPC call engine.
//!
//! Defines the [`Transport`] seam, the HTTP implementation
//! ([`HttpTransport`]), the envelope codec, the retry policy, typed
//! result views and the [`RpcEngine`] that ties them together. A scripted
//! transport for tests lives in `mock`.

mod engine;
mod http_adapter;
#[cfg(test)]
pub mod mock;
pub mod protocol;
pub mod retry;
pub mod types;

pub use engine::RpcEngine;
pub use http_adapter::{Endpoint, HttpTransport};
pub use protocol::{decimal, CallEnvelope, RawResponse};
pub use retry::RetryPolicy;
pub use types::{BlockchainTicket, PreviousBlock, SupernodeEntry};

use async_trait::async_trait;

use crate::error::RpcError;

/// Delivers one encoded request and returns the raw response.
///
/// Implementations perform exactly one exchange per call: no retries, no
/// JSON-RPC decoding. Failures to reach the daemon are reported as
/// [`RpcError::Network`] or [`RpcError::Timeout`]; any HTTP response that
/// arrives, whatever its status, is returned for decoding.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait until the transport may send another request. The engine awaits
    /// this before the request timeout starts, so queueing is never reported
    /// as a timeout.
    async fn ready(&self) {}

    async fn send(&self, envelope: &CallEnvelope) -> Result<RawResponse, RpcError>;
}
