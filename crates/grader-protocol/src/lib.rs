//! Wire contract between the grader client and the remote execution service.
//!
//! A remote run is a single self-sufficient [`RemoteEnvelope`]: global
//! settings plus the literal contents of the submission source and of every
//! test file each requested command will need. The worker reconstructs a
//! runnable filesystem from the envelope alone; nothing else crosses the
//! trust boundary except a captured text stream per command.
//!
//! Because only text comes back, the worker's exit status is carried as a
//! trailing line of that text. The encode/decode convention is isolated in
//! [`exit_code`] so a future structured-response transport can replace it
//! without touching callers.

pub mod envelope;
pub mod error;
pub mod exit_code;
pub mod response;
pub mod rpc;

pub use envelope::{
    embedded_timeout, CommandRequest, CompilerFamily, CompilerSelection, RemoteEnvelope,
    RemoteSettings, ReporterKind, TestFile,
};
pub use error::ApiError;
pub use exit_code::{append_exit_code, split_exit_code};
pub use response::{RemoteResult, RemoteVerdict};
pub use rpc::{Operation, RpcRequest, RpcResponse};
