//! HTTP transport for Pastel daemon endpoints.
//!
//! Implements [`Transport`](super::Transport) with `reqwest`: one POST per
//! attempt, basic auth carried in a sensitive header, a hard per-request
//! timeout, and optional client-side rate limiting.

mod client;
mod connection;

pub use client::HttpTransport;
pub use connection::Endpoint;
