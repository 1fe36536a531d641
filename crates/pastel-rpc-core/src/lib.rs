//! Resilient JSON-RPC client for Pastel daemons.
//!
//! [`rpc::RpcEngine`] frames calls, authenticates with HTTP Basic auth,
//! bounds every attempt with a timeout and retries failures with
//! exponential backoff. [`credentials`] finds the endpoint, and [`ops`]
//! names the daemon methods tooling calls most.

pub mod config;
pub mod credentials;
pub mod error;
pub mod ops;
pub mod rpc;

pub use config::EngineConfig;
pub use error::{RpcError, ServerError};
pub use ops::PastelRpc;
pub use rpc::{Endpoint, RetryPolicy, RpcEngine};
