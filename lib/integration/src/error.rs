//! Error types for the integration crate.
//!
//! Connector errors describe transport-level problems: the request never
//! produced a usable answer. A provider that answers and refuses the message
//! is reported through the result types, not through this enum.

use std::fmt;

/// Errors from outbound connector calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// Connection to service failed.
    ConnectionFailed { service: String, reason: String },
    /// The service rejected the request.
    Rejected { service: String, status: u16, body: String },
    /// Invalid request parameters (bad URL, empty recipient).
    InvalidParameters { service: String, reason: String },
    /// The response could not be decoded.
    ProtocolError { service: String, reason: String },
}

impl ConnectorError {
    pub(crate) fn from_reqwest(service: &str, err: &reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidParameters {
                service: service.to_string(),
                reason: err.to_string(),
            }
        } else if err.is_decode() {
            Self::ProtocolError {
                service: service.to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::ConnectionFailed {
                service: service.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { service, reason } => {
                write!(f, "{service}: connection failed: {reason}")
            }
            Self::Rejected {
                service,
                status,
                body,
            } => {
                write!(f, "{service}: rejected with status {status}: {body}")
            }
            Self::InvalidParameters { service, reason } => {
                write!(f, "{service}: invalid parameters: {reason}")
            }
            Self::ProtocolError { service, reason } => {
                write!(f, "{service}: protocol error: {reason}")
            }
        }
    }
}

impl std::error::Error for ConnectorError {}
