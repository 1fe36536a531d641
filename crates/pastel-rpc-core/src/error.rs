use std::fmt;
use std::time::Duration;

/// Boxed cause carried by network-level failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure kinds surfaced by the RPC engine.
///
/// Retryable kinds (`Network`, `Timeout`, `MalformedResponse`, `Server`) are
/// absorbed by the retry controller until attempts run out; only the last
/// one reaches the caller. The remaining kinds are fatal and never retried.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("network error: {0}")]
    Network(#[source] BoxError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed JSON-RPC response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("missing RPC credentials: {field} is not set")]
    MissingCredentials { field: &'static str },

    #[error("call cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RpcError {
    /// Build a `Network` error from any displayable cause.
    pub fn network(cause: impl Into<BoxError>) -> Self {
        Self::Network(cause.into())
    }

    /// Fatal kinds end the call immediately regardless of retry policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials { .. } | Self::Cancelled | Self::InvalidConfig(_)
        )
    }

    /// The JSON-RPC error object, if the daemon returned one.
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            Self::Server(err) => Some(err),
            _ => None,
        }
    }
}

/// A well-formed JSON-RPC `error` object returned by the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " ({data})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display_includes_code_and_data() {
        let err = ServerError {
            code: -8,
            message: "Invalid parameter".to_owned(),
            data: Some(serde_json::json!({"arg": 1})),
        };
        assert_eq!(err.to_string(), r#"RPC error -8: Invalid parameter ({"arg":1})"#);

        let wrapped = RpcError::from(err.clone());
        assert_eq!(wrapped.server_error(), Some(&err));
        assert!(!wrapped.is_fatal());
    }

    #[test]
    fn fatal_kinds() {
        assert!(RpcError::Cancelled.is_fatal());
        assert!(RpcError::MissingCredentials { field: "rpcuser" }.is_fatal());
        assert!(RpcError::InvalidConfig("bad".into()).is_fatal());
        assert!(!RpcError::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(!RpcError::network("connection refused").is_fatal());
    }
}
