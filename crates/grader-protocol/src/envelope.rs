//! The remote submission envelope.
//!
//! One envelope is built per `--remote` invocation and submitted as a single
//! JSON object. Invariant: the envelope is self-sufficient. The worker must
//! be able to reconstruct a runnable tree using only envelope contents plus
//! its own fixed installation (compilers, headers, test driver).

use serde::{Deserialize, Serialize};

/// Compiler family requested by the client.
///
/// The worker resolves the family (plus an optional explicit binary name)
/// against its own installation; client-side paths never cross the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilerFamily {
    Gcc,
    Clang,
    Nvcc,
}

impl CompilerFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerFamily::Gcc => "gcc",
            CompilerFamily::Clang => "clang",
            CompilerFamily::Nvcc => "nvcc",
        }
    }
}

impl std::fmt::Display for CompilerFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compiler choice carried in the envelope: family plus an optional explicit
/// executable name. An empty name means "probe for a default of this family".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSelection {
    pub family: CompilerFamily,
    #[serde(default)]
    pub name: String,
}

/// Which reporter the worker should drive while executing the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReporterKind {
    #[default]
    Terminal,
    Json,
}

/// Global settings for a remote run, re-derived from the invocation's flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Verbosity count (`-v` occurrences).
    #[serde(default)]
    pub verbose: u32,

    /// Reporter the worker drives.
    #[serde(default)]
    pub reporter: ReporterKind,

    /// Keep running tests after the first failure.
    #[serde(default)]
    pub ignore_errors: bool,

    /// Explicit per-test timeout override, seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,

    /// Disable timeouts entirely.
    #[serde(default)]
    pub no_timeout: bool,

    /// Requested compiler, if the client pinned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerSelection>,

    /// Whether the worker should emit ANSI color.
    #[serde(default)]
    pub color: bool,
}

/// A test file shipped by value: its client-side path (identity) and its
/// literal content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFile {
    pub path: String,
    pub content: String,
}

/// One command the worker should execute, with the test set the client
/// resolved for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub name: String,
    pub tests: Vec<TestFile>,
}

/// The unit exchanged with the remote worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEnvelope {
    pub settings: RemoteSettings,

    /// Literal content of the submission source file.
    pub source: String,

    /// Commands in execution order.
    pub commands: Vec<CommandRequest>,
}

impl RemoteEnvelope {
    /// Sum of the timeouts embedded in the first line of every included
    /// test. Used by the client to warn when the total exceeds the server's
    /// aggregate deadline; the remote side enforces one deadline across the
    /// whole submission, not a per-test reset.
    pub fn declared_timeout_sum(&self) -> f64 {
        self.commands
            .iter()
            .flat_map(|c| &c.tests)
            .filter_map(|t| embedded_timeout(&t.content))
            .sum()
    }
}

/// Parse a `timeout <seconds>` header from the first line of a test file.
pub fn embedded_timeout(content: &str) -> Option<f64> {
    let first_line = content.lines().next()?;
    let mut tokens = first_line.split(' ');
    if tokens.next() != Some("timeout") {
        return None;
    }
    tokens.next()?.parse().ok()
}
