//! Error taxonomy for the grading pipeline.
//!
//! Setup errors abort the whole run with an operator-facing message and are
//! never retried. Compilation failures and per-test outcomes are not errors
//! in this sense; they travel through [`crate::compiler::CompilationResult`]
//! and [`crate::runner::RunnerOutput`] so partial diagnostic text is always
//! reported before the command gives up.

use grader_protocol::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum GraderError {
    #[error("I'm sorry, I could not find a suitable compiler.")]
    NoCompiler,

    /// No test files after discovery; the message names what was searched.
    #[error("{0}")]
    NoTests(String),

    #[error("Could not find source code file {0}")]
    SourceMissing(String),

    #[error("Could not find test file {0}")]
    TestMissing(String),

    #[error("Unknown command {0}")]
    UnknownCommand(String),

    #[error("Command '{0}' does not support '--remote' execution")]
    RemoteIneligible(String),

    #[error("This task does not support remote execution.")]
    RemoteUnsupported,

    /// Configuration file problems, with the full explanation text.
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_operator_wording() {
        assert_eq!(
            GraderError::SourceMissing("cp.cc".to_string()).to_string(),
            "Could not find source code file cp.cc"
        );
        assert_eq!(
            GraderError::RemoteIneligible("demo".to_string()).to_string(),
            "Command 'demo' does not support '--remote' execution"
        );
    }
}
