use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::RpcError;

use super::protocol::{CallEnvelope, RawResponse};
use super::Transport;

/// One scripted reaction to a request.
#[derive(Debug, Clone)]
pub struct Reply {
    kind: ReplyKind,
    delay: Option<Duration>,
}

#[derive(Debug, Clone)]
enum ReplyKind {
    Result(serde_json::Value),
    ServerError { code: i64, message: String },
    Raw { status: u16, body: String },
    Network(String),
    Timeout,
}

impl Reply {
    /// A successful JSON-RPC response echoing the request id.
    pub fn result(value: serde_json::Value) -> Self {
        Self::of(ReplyKind::Result(value))
    }

    /// A JSON-RPC error object, sent with HTTP 500 as the daemon does.
    pub fn server_error(code: i64, message: &str) -> Self {
        Self::of(ReplyKind::ServerError {
            code,
            message: message.to_owned(),
        })
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self::of(ReplyKind::Raw {
            status,
            body: body.to_owned(),
        })
    }

    pub fn network(cause: &str) -> Self {
        Self::of(ReplyKind::Network(cause.to_owned()))
    }

    /// A transport-reported timeout, returned without waiting.
    pub fn timeout() -> Self {
        Self::of(ReplyKind::Timeout)
    }

    /// Sleep on the tokio clock before replying.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn of(kind: ReplyKind) -> Self {
        Self { kind, delay: None }
    }

    fn into_response(self, id: u64) -> Result<RawResponse, RpcError> {
        match self.kind {
            ReplyKind::Result(value) => Ok(RawResponse::new(
                200,
                json!({"result": value, "error": null, "id": id}).to_string(),
            )),
            ReplyKind::ServerError { code, message } => Ok(RawResponse::new(
                500,
                json!({"result": null, "error": {"code": code, "message": message}, "id": id})
                    .to_string(),
            )),
            ReplyKind::Raw { status, body } => Ok(RawResponse::new(status, body)),
            ReplyKind::Network(cause) => Err(RpcError::network(cause)),
            ReplyKind::Timeout => Err(RpcError::Timeout(Duration::from_secs(20))),
        }
    }
}

/// A [`Transport`] that replays scripted replies in order and records what
/// it was sent. Once the script runs out, the `repeat` reply (if any) is
/// used for every further request.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    repeat: Option<Reply>,
    ready_delay: Option<Duration>,
    sent: Mutex<Vec<CallEnvelope>>,
}

impl ScriptedTransport {
    pub fn builder() -> ScriptedTransportBuilder {
        ScriptedTransportBuilder {
            script: VecDeque::new(),
            repeat: None,
            ready_delay: None,
        }
    }

    /// Number of requests that reached the transport.
    pub fn attempts(&self) -> usize {
        self.sent.lock().expect("mock lock poisoned").len()
    }

    pub fn seen_ids(&self) -> Vec<u64> {
        self.sent
            .lock()
            .expect("mock lock poisoned")
            .iter()
            .map(|env| env.id)
            .collect()
    }

    pub fn seen_methods(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("mock lock poisoned")
            .iter()
            .map(|env| env.method.clone())
            .collect()
    }

    pub fn seen_params(&self) -> Vec<Vec<serde_json::Value>> {
        self.sent
            .lock()
            .expect("mock lock poisoned")
            .iter()
            .map(|env| env.params.clone())
            .collect()
    }
}

pub struct ScriptedTransportBuilder {
    script: VecDeque<Reply>,
    repeat: Option<Reply>,
    ready_delay: Option<Duration>,
}

impl ScriptedTransportBuilder {
    pub fn then(mut self, reply: Reply) -> Self {
        self.script.push_back(reply);
        self
    }

    pub fn repeat(mut self, reply: Reply) -> Self {
        self.repeat = Some(reply);
        self
    }

    /// Hold every request in `ready` for `delay`, like a rate limiter would.
    pub fn ready_after(mut self, delay: Duration) -> Self {
        self.ready_delay = Some(delay);
        self
    }

    pub fn build(self) -> ScriptedTransport {
        ScriptedTransport {
            script: Mutex::new(self.script),
            repeat: self.repeat,
            ready_delay: self.ready_delay,
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn ready(&self) {
        if let Some(delay) = self.ready_delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn send(&self, envelope: &CallEnvelope) -> Result<RawResponse, RpcError> {
        self.sent
            .lock()
            .expect("mock lock poisoned")
            .push(envelope.clone());

        let next = self.script.lock().expect("mock lock poisoned").pop_front();
        let reply = next
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| Reply::network("script exhausted"));

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.into_response(envelope.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::protocol::decode_response;

    #[tokio::test]
    async fn replays_script_then_repeat() {
        let transport = ScriptedTransport::builder()
            .then(Reply::result(json!("first")))
            .repeat(Reply::server_error(-1, "again"))
            .build();

        let first = CallEnvelope::new(1, None, "a", vec![]);
        let raw = transport.send(&first).await.unwrap();
        assert_eq!(decode_response(1, &raw).unwrap(), json!("first"));

        let second = CallEnvelope::new(2, None, "b", vec![json!(1)]);
        let raw = transport.send(&second).await.unwrap();
        assert_eq!(raw.status, 500);
        assert!(decode_response(2, &raw).is_err());

        assert_eq!(transport.seen_ids(), vec![1, 2]);
        assert_eq!(transport.seen_params(), vec![vec![], vec![json!(1)]]);
    }

    #[tokio::test]
    async fn exhausted_script_fails_as_network_error() {
        let transport = ScriptedTransport::builder().build();
        let err = transport
            .send(&CallEnvelope::new(1, None, "a", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Network(_)));
    }
}
