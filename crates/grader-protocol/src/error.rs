//! Structured errors surfaced by the remote execution service.

use serde::{Deserialize, Serialize};

/// Error reported by the service, either as a structured response body or
/// synthesized from a bare transport failure.
///
/// `unexpected` marks errors that should not occur in normal use and likely
/// indicate a grader bug; callers append the "report this to the course
/// staff" hint for those.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP-like status code.
    pub status: u16,

    /// Machine-readable reason, when the service provided one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// True when the error may indicate a bug rather than operator error.
    #[serde(default)]
    pub unexpected: bool,

    /// Human-readable, single-line message.
    pub message: String,
}

impl ApiError {
    /// Synthesize an error for a failure the service gave no structured
    /// reason for (connection refused, malformed response, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            reason: None,
            unexpected: true,
            message: message.into(),
        }
    }

    /// True when the service rejected the supplied API token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.reason.as_deref(), Some("AUTH_ERROR" | "AUTH_FAILED"))
    }
}
