use std::num::NonZeroU32;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pastel_rpc_core::config::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};
use pastel_rpc_core::credentials::{DEFAULT_RPC_HOST, FALLBACK_RPC_PORT};
use pastel_rpc_core::{EngineConfig, RetryPolicy};
use serde_json::Value;

/// pastel-rpc: call a Pastel daemon over authenticated JSON-RPC with retries.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Daemon RPC host. Used only when user and password are also given.
    #[arg(long, env = "RPC_HOST", default_value = DEFAULT_RPC_HOST)]
    pub rpc_host: String,

    /// Daemon RPC port.
    #[arg(long, env = "RPC_PORT", default_value_t = FALLBACK_RPC_PORT)]
    pub rpc_port: u16,

    /// RPC username. When omitted, `pastel.conf` is read.
    #[arg(long, env = "RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password. When omitted, `pastel.conf` is read.
    #[arg(long, env = "RPC_PASSWORD", hide_env_values = true)]
    pub rpc_password: Option<String>,

    /// Directory holding `pastel.conf` (default `~/.pastel`).
    #[arg(long)]
    pub conf_dir: Option<PathBuf>,

    /// Prefix every method as `<service-name>.<method>`.
    #[arg(long)]
    pub service_name: Option<String>,

    /// Base backoff in seconds; retry n waits base * 2^n.
    #[arg(long, default_value_t = DEFAULT_RECONNECT_TIMEOUT.as_secs())]
    pub reconnect_timeout_secs: u64,

    /// Retries after the first attempt.
    #[arg(long, default_value_t = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    pub max_reconnect_attempts: u32,

    /// Per-attempt timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub request_timeout_secs: u64,

    /// Which failures are retried: `always` or `transient`.
    #[arg(long, default_value_t = RetryPolicy::Always)]
    pub retry_policy: RetryPolicy,

    /// Cap on outbound requests per second.
    #[arg(long)]
    pub requests_per_second: Option<NonZeroU32>,

    /// Give up on the whole call, retries included, after this many seconds.
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Call any daemon method. Each param is parsed as JSON, or sent as a
    /// string when it is not valid JSON.
    Call {
        method: String,
        params: Vec<String>,
    },
    /// Print the height of the current best block.
    BlockHeight,
    /// List every supernode with rank, pubkey and PastelID merged in.
    Supernodes,
    /// Look up a blockchain ticket and its activation ticket by txid.
    Ticket { txid: String },
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::from_secs(
            self.reconnect_timeout_secs,
            self.max_reconnect_attempts,
            self.request_timeout_secs,
        )
        .with_retry_policy(self.retry_policy)
        .with_requests_per_second(self.requests_per_second)
    }

    /// Explicit credentials, if both user and password were supplied.
    pub fn explicit_credentials(&self) -> Option<(&str, &str)> {
        match (self.rpc_user.as_deref(), self.rpc_password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user, password))
            }
            _ => None,
        }
    }
}

/// `pastel-cli` argument convention: JSON when it parses, a string otherwise.
pub fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}
