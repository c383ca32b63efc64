//! Request/response envelopes for the service transport.
//!
//! Protocol: one JSON request line on the transport's stdin, one JSON
//! response line on its stdout. Maps directly to an SSH forced-command or
//! any other line-oriented endpoint.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Supported service operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Connectivity and token check; returns the authenticated identity.
    Whoami,
    /// Submit a [`crate::RemoteEnvelope`] for execution.
    Submit,
}

/// Request envelope sent to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Caller-chosen ID for correlation; unique per client process.
    pub request_id: String,

    /// Base64-encoded API token.
    pub token: String,

    pub op: Operation,

    /// Operation-specific payload (the envelope for `submit`).
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Response envelope emitted by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Echoed request ID.
    pub request_id: String,

    pub ok: bool,

    /// Present when `ok` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Present when `ok` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl RpcResponse {
    pub fn success(request_id: String, payload: serde_json::Value) -> Self {
        Self {
            request_id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(request_id: String, error: ApiError) -> Self {
        Self {
            request_id,
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Extract the payload, turning an error response into [`ApiError`].
    pub fn into_payload(self) -> Result<serde_json::Value, ApiError> {
        if self.ok {
            Ok(self.payload.unwrap_or(serde_json::Value::Null))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| ApiError::transport("service returned an empty error")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses() {
        let json = r#"{
            "request_id": "req-001",
            "token": "c2VjcmV0",
            "op": "whoami",
            "payload": {}
        }"#;
        let req: RpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.op, Operation::Whoami);
        assert_eq!(req.request_id, "req-001");
    }

    #[test]
    fn success_payload_extraction() {
        let resp = RpcResponse::success("r".to_string(), serde_json::json!({"user": "me"}));
        let payload = resp.into_payload().unwrap();
        assert_eq!(payload["user"], "me");
    }

    #[test]
    fn failure_surfaces_api_error() {
        let resp = RpcResponse::failure(
            "r".to_string(),
            ApiError {
                status: 401,
                reason: Some("AUTH_FAILED".to_string()),
                unexpected: false,
                message: "bad token".to_string(),
            },
        );
        let err = resp.into_payload().unwrap_err();
        assert!(err.is_auth_failure());
    }
}
