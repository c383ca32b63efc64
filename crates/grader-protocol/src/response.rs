//! Per-command results returned by the remote service.

use serde::{Deserialize, Serialize};

/// Verdict tag for one remotely executed command.
///
/// `Timeout` means the service's aggregate deadline was exhausted, not a
/// per-test timeout; per-test timeouts surface inside `output` like any
/// local run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteVerdict {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "ERROR")]
    Error,
}

/// Result of one command executed remotely. `output` is a single text blob;
/// on `Success` its last line may carry the worker's exit status (see
/// [`crate::exit_code`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResult {
    pub verdict: RemoteVerdict,
    pub output: String,
}
