//! Gateway error taxonomy

use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure of a single gateway call
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway answered with a non-success status
    #[error("{op} failed: {message}")]
    Query { op: &'static str, message: String },

    /// The gateway could not be reached
    #[error("{op}: gateway unreachable: {message}")]
    Connection { op: &'static str, message: String },

    /// The gateway answered but the payload did not match the record
    #[error("{op}: malformed response: {message}")]
    Decode { op: &'static str, message: String },
}

impl GatewayError {
    pub fn query(op: &'static str, message: impl Into<String>) -> Self {
        Self::Query {
            op,
            message: message.into(),
        }
    }

    pub fn connection(op: &'static str, message: impl Into<String>) -> Self {
        Self::Connection {
            op,
            message: message.into(),
        }
    }

    pub fn decode(op: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            op,
            message: message.into(),
        }
    }

    /// Map a transport error from the HTTP bridge
    pub fn from_transport(op: &'static str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::connection(op, err.to_string())
        } else if err.is_decode() {
            Self::decode(op, err.to_string())
        } else {
            Self::query(op, err.to_string())
        }
    }

    /// True when the gateway itself was unreachable
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Name of the gateway operation that failed
    pub fn op(&self) -> &'static str {
        match self {
            Self::Query { op, .. } | Self::Connection { op, .. } | Self::Decode { op, .. } => op,
        }
    }
}
