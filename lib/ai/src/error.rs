//! Error types for the AI crate.

use std::fmt;

/// Errors from AI backend calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    /// The backend could not be reached.
    RequestFailed { reason: String },
    /// The backend answered with a non-success status.
    Rejected { status: u16, body: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// The backend returned no choices or an empty message.
    EmptyResponse,
}

impl fmt::Display for AiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => write!(f, "AI request failed: {reason}"),
            Self::Rejected { status, body } => {
                write!(f, "AI backend rejected request ({status}): {body}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse AI response: {reason}")
            }
            Self::EmptyResponse => write!(f, "AI backend returned an empty response"),
        }
    }
}

impl std::error::Error for AiError {}
