//! Client side of the remote execution service.
//!
//! The transport is a configured endpoint command (typically an SSH forced
//! command): spawn it, write one JSON request line to its stdin, read one
//! JSON response line from its stdout. Everything that can go wrong on the
//! wire is folded into [`ApiError::transport`] so callers only ever see the
//! structured error type.

use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use uuid::Uuid;

use grader_protocol::{ApiError, Operation, RemoteEnvelope, RemoteResult, RpcRequest, RpcResponse};

/// Handle to the remote service.
pub struct Api {
    endpoint: Vec<String>,
    /// API token, already base64-encoded for the wire.
    token: String,
}

impl Api {
    pub fn new(endpoint: Vec<String>, raw_token: &str) -> Self {
        Self {
            endpoint,
            token: BASE64.encode(raw_token.trim()),
        }
    }

    /// Verify connectivity and the token; returns the authenticated user.
    pub fn test_connection(&self) -> Result<String, ApiError> {
        let payload = self.call(Operation::Whoami, Value::Null)?;
        payload
            .get("user")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::transport("whoami response carried no user"))
    }

    /// Submit an envelope for execution on `grader` and wait for results.
    pub fn submit_run(
        &self,
        grader: &str,
        envelope: &RemoteEnvelope,
    ) -> Result<Vec<RemoteResult>, ApiError> {
        let payload = self.call(
            Operation::Submit,
            json!({ "grader": grader, "envelope": envelope }),
        )?;
        let results = payload
            .get("results")
            .cloned()
            .ok_or_else(|| ApiError::transport("submit response carried no results"))?;
        serde_json::from_value(results)
            .map_err(|e| ApiError::transport(format!("malformed results from service: {e}")))
    }

    fn call(&self, op: Operation, payload: Value) -> Result<Value, ApiError> {
        let request = RpcRequest {
            request_id: Uuid::new_v4().to_string(),
            token: self.token.clone(),
            op,
            payload,
        };
        let line = serde_json::to_string(&request)
            .map_err(|e| ApiError::transport(format!("could not encode request: {e}")))?;

        let mut child = Command::new(&self.endpoint[0])
            .args(&self.endpoint[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ApiError::transport(format!(
                    "could not start service endpoint {}: {e}",
                    self.endpoint[0]
                ))
            })?;

        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| ApiError::transport("endpoint stdin unavailable"))?;
            writeln!(stdin, "{line}")
                .map_err(|e| ApiError::transport(format!("could not reach the service: {e}")))?;
        }
        // Signal end of input; some endpoints read to EOF before replying.
        drop(child.stdin.take());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ApiError::transport("endpoint stdout unavailable"))?;
        let mut response_line = String::new();
        BufReader::new(stdout)
            .read_line(&mut response_line)
            .map_err(|e| ApiError::transport(format!("could not read service response: {e}")))?;
        let _ = child.wait();

        if response_line.trim().is_empty() {
            return Err(ApiError::transport(
                "service closed the connection without a response",
            ));
        }
        let response: RpcResponse = serde_json::from_str(response_line.trim()).map_err(|e| {
            ApiError::transport(format!("could not parse service response: {e}"))
        })?;
        response.into_payload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_endpoint(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[test]
    fn whoami_roundtrip_through_a_scripted_endpoint() {
        let api = Api::new(
            sh_endpoint(
                r#"read line; printf '{"request_id":"x","ok":true,"payload":{"user":"student"}}\n'"#,
            ),
            "secret-token",
        );
        assert_eq!(api.test_connection().unwrap(), "student");
    }

    #[cfg(unix)]
    #[test]
    fn structured_error_is_relayed() {
        let api = Api::new(
            sh_endpoint(
                r#"read line; printf '{"request_id":"x","ok":false,"error":{"status":401,"reason":"AUTH_FAILED","message":"bad token"}}\n'"#,
            ),
            "wrong",
        );
        let err = api.test_connection().unwrap_err();
        assert!(err.is_auth_failure());
        assert_eq!(err.to_string(), "bad token");
    }

    #[cfg(unix)]
    #[test]
    fn silent_endpoint_is_a_transport_error() {
        let api = Api::new(sh_endpoint("read line; exit 0"), "t");
        let err = api.test_connection().unwrap_err();
        assert!(err.unexpected);
        assert!(err.to_string().contains("without a response"));
    }

    #[cfg(unix)]
    #[test]
    fn missing_endpoint_program_is_a_transport_error() {
        let api = Api::new(vec!["/no/such/endpoint".to_string()], "t");
        let err = api.test_connection().unwrap_err();
        assert!(err.to_string().contains("could not start service endpoint"));
    }

    #[test]
    fn token_is_base64_on_the_wire() {
        let api = Api::new(vec!["true".to_string()], "secret\n");
        assert_eq!(api.token, "c2VjcmV0");
    }
}
