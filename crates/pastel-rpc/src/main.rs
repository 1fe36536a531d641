mod cli;

use std::time::Duration;

use clap::Parser;
use eyre::{eyre, WrapErr};
use tokio_util::sync::CancellationToken;

use pastel_rpc_core::credentials::resolve_endpoint;
use pastel_rpc_core::{Endpoint, PastelRpc, RpcEngine, RpcError};
use serde_json::{json, Value};

use crate::cli::{parse_param, Cli, Command};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let endpoint = endpoint_from_args(&args)?;
    let config = args.engine_config();
    tracing::info!(
        url = %endpoint.url(),
        retry_policy = %config.retry_policy,
        worst_case_ms = config.worst_case_duration().as_millis() as u64,
        "using Pastel RPC endpoint"
    );

    let mut engine = RpcEngine::connect(&endpoint, config).context("configure RPC engine")?;
    if let Some(service) = &args.service_name {
        engine = engine.with_service_name(service.clone());
    }

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, args.deadline_secs.map(Duration::from_secs));

    let result = tokio::select! {
        result = run(&engine, &args.command, &cancel) => result,
        _ = cancel.cancelled() => Err(RpcError::Cancelled),
    };
    cancel.cancel();

    let value = result.map_err(|err| {
        eyre!(format_rpc_error(Some(&endpoint.url()), &err)).wrap_err("RPC call failed")
    })?;

    let rendered = serde_json::to_string_pretty(&value).context("render result as JSON")?;
    println!("{rendered}");
    Ok(())
}

async fn run(engine: &RpcEngine, command: &Command, cancel: &CancellationToken) -> Result<Value, RpcError> {
    match command {
        Command::Call { method, params } => {
            let params = params.iter().map(|p| parse_param(p)).collect();
            engine.call_with_cancel(method, params, cancel).await
        }
        Command::BlockHeight => engine.get_current_block_height().await.map(Value::from),
        Command::Supernodes => engine.supernode_list().await.map(|list| json!(list)),
        Command::Ticket { txid } => Ok(match engine.get_blockchain_ticket(txid).await? {
            Some(ticket) => json!(ticket),
            None => Value::Null,
        }),
    }
}

/// Explicit flags when user and password are both given, otherwise the
/// `RPC_*` environment or `pastel.conf`.
fn endpoint_from_args(args: &Cli) -> eyre::Result<Endpoint> {
    match args.explicit_credentials() {
        Some((user, password)) => Endpoint::new(args.rpc_host.clone(), args.rpc_port, user, password)
            .map_err(|err| eyre!(format_rpc_error(None, &err)))
            .wrap_err("build RPC endpoint from flags"),
        None => resolve_endpoint(args.conf_dir.as_deref())
            .map_err(|err| eyre!(format_rpc_error(None, &err)))
            .wrap_err("resolve RPC credentials"),
    }
}

/// Cancel `token` on Ctrl-C or once `deadline` elapses.
fn spawn_cancel_triggers(token: &CancellationToken, deadline: Option<Duration>) {
    let on_signal = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    tracing::warn!("interrupted; cancelling RPC call");
                    on_signal.cancel();
                }
            }
            _ = on_signal.cancelled() => {}
        }
    });

    if let Some(deadline) = deadline {
        let on_deadline = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    tracing::warn!(deadline_secs = deadline.as_secs(), "deadline reached; cancelling RPC call");
                    on_deadline.cancel();
                }
                _ = on_deadline.cancelled() => {}
            }
        });
    }
}

fn format_rpc_error(url: Option<&str>, err: &RpcError) -> String {
    let mut lines = Vec::new();
    if let Some(url) = url {
        lines.push(format!("RPC endpoint `{url}`"));
    }
    lines.push(format!("error: {err}"));

    match err {
        RpcError::MissingCredentials { field } => lines.push(format!(
            "hint: `{field}` is not set; pass --rpc-user/--rpc-password, export RPC_USER/RPC_PASSWORD, or add it to pastel.conf"
        )),
        RpcError::MalformedResponse(message)
            if message.contains("HTTP 401") || message.contains("HTTP 403") =>
        {
            lines.push("hint: authentication failed; verify rpcuser/rpcpassword".into())
        }
        RpcError::Network(_) => lines.push(
            "hint: daemon unreachable; verify that pasteld is running and the host and port are right"
                .into(),
        ),
        RpcError::Timeout(_) => lines.push(
            "hint: daemon did not answer in time; raise --request-timeout-secs if it is busy".into(),
        ),
        RpcError::Server(server) if server.code == -28 => lines.push(
            "hint: daemon is still warming up; retry once it has finished loading".into(),
        ),
        RpcError::Cancelled => lines.push("hint: call cancelled by Ctrl-C or --deadline-secs".into()),
        RpcError::InvalidConfig(_) => lines.push(
            "hint: check --conf-dir and the rpcport/rpcuser/rpcpassword lines in pastel.conf".into(),
        ),
        _ => {}
    }

    lines.join("\n")
}
