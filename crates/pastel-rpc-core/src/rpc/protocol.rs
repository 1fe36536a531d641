//! JSON-RPC 1.0 envelope framing and response decoding.

use serde::Serialize;
use serde_json::Value;

use crate::error::{RpcError, ServerError};

/// Protocol marker sent with every request. `pasteld` (like `bitcoind`)
/// speaks the 1.0 dialect.
pub const JSONRPC_VERSION: &str = "1.0";

/// A fully assembled request, ready for transport.
///
/// Retries of one logical call re-send the same envelope, so its `id`
/// identifies the call rather than an individual attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallEnvelope {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl CallEnvelope {
    /// Frame `method` under an optional service-name prefix.
    ///
    /// No arity or type checks are made on `params`; that is the daemon's
    /// job.
    pub fn new(id: u64, service_name: Option<&str>, method: &str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: qualified_method(service_name, method),
            params,
        }
    }

    pub fn to_body(&self) -> Result<Vec<u8>, RpcError> {
        serde_json::to_vec(self)
            .map_err(|e| RpcError::InvalidConfig(format!("encode JSON-RPC request: {e}")))
    }
}

/// Wire method name: `prefix.method` when a prefix is configured.
pub fn qualified_method(service_name: Option<&str>, method: &str) -> String {
    match service_name {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}.{method}"),
        _ => method.to_owned(),
    }
}

/// An HTTP response as received, before JSON-RPC decoding.
///
/// Non-2xx statuses are still carried here: daemons report RPC errors with
/// HTTP 500 and a valid JSON-RPC body.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Decode a raw response for the request with id `expected_id`.
///
/// Returns the `result` payload untouched, or the daemon's error object as
/// [`RpcError::Server`]. Anything that cannot be read unambiguously is
/// [`RpcError::MalformedResponse`].
pub fn decode_response(expected_id: u64, raw: &RawResponse) -> Result<Value, RpcError> {
    let decoded: Value = serde_json::from_str(&raw.body).map_err(|e| {
        RpcError::MalformedResponse(format!(
            "HTTP {}: body is not JSON ({e}): {}",
            raw.status,
            truncate(&raw.body)
        ))
    })?;

    let Value::Object(mut fields) = decoded else {
        return Err(RpcError::MalformedResponse(format!(
            "HTTP {}: expected a JSON object, got {}",
            raw.status,
            truncate(&raw.body)
        )));
    };

    match fields.get("id") {
        None | Some(Value::Null) => {}
        Some(id) if id_matches(id, expected_id) => {}
        Some(id) => {
            return Err(RpcError::MalformedResponse(format!(
                "response id {id} does not match request id {expected_id}"
            )));
        }
    }

    if let Some(err) = fields.remove("error").filter(|e| !e.is_null()) {
        return Err(parse_jsonrpc_error(err));
    }

    fields.remove("result").ok_or_else(|| {
        RpcError::MalformedResponse(format!(
            "HTTP {}: response has neither result nor error",
            raw.status
        ))
    })
}

/// Parse a JSON-RPC error value into a structured error.
///
/// The expected shape is `{"code": <int>, "message": <string>, "data"?: ..}`.
/// Anything else is reported as a malformed response with the raw JSON.
pub fn parse_jsonrpc_error(err: Value) -> RpcError {
    let code = err.get("code").and_then(Value::as_i64);
    let message = err.get("message").and_then(Value::as_str);

    match (code, message) {
        (Some(code), Some(message)) => RpcError::Server(ServerError {
            code,
            message: message.to_owned(),
            data: err.get("data").filter(|d| !d.is_null()).cloned(),
        }),
        _ => RpcError::MalformedResponse(format!("non-standard JSON-RPC error: {err}")),
    }
}

/// Build an exact decimal parameter, e.g. a PSL amount.
///
/// The digits are sent verbatim rather than through `f64`, so `"0.1"` goes
/// on the wire as `0.1` and not as the nearest binary float.
pub fn decimal(text: &str) -> Result<Value, RpcError> {
    let trimmed = text.trim();
    match serde_json::from_str::<serde_json::Number>(trimmed) {
        Ok(number) => Ok(Value::Number(number)),
        Err(e) => Err(RpcError::InvalidConfig(format!(
            "`{text}` is not a decimal number: {e}"
        ))),
    }
}

// Some proxies stringify ids; accept either form.
fn id_matches(id: &Value, expected: u64) -> bool {
    match id {
        Value::Number(n) => n.as_u64() == Some(expected),
        Value::String(s) => s.parse::<u64>().ok() == Some(expected),
        _ => false,
    }
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 256;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
