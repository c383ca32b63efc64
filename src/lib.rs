//! Exercise grading harness.
//!
//! Compiles a student submission against the exercise's fixed test driver,
//! executes the result under a matrix of verification modes (plain run,
//! sanitizers, device memory checkers, benchmarks) and reports a verdict per
//! test. The same command pipeline runs either locally or, with `--remote`,
//! on a worker that reconstructs the run from a self-sufficient envelope
//! (see the `grader-protocol` and `grader-worker` crates).

pub mod api;
pub mod cancel;
pub mod command;
pub mod compiler;
pub mod config;
pub mod error;
pub mod remote;
pub mod reporter;
pub mod runner;
pub mod session;
pub mod verdict;

pub use command::{command_from_name, expand_macro, CommandSpec, Flavor, COMMANDS};
pub use compiler::{CompilationResult, Compiler};
pub use config::{ExerciseConfig, RemoteConfig};
pub use error::GraderError;
pub use reporter::{Reporter, Style};
pub use runner::{Runner, RunnerKind, RunnerOutput};
pub use session::Session;
pub use verdict::Verdict;

pub use grader_protocol::{CompilerFamily, CompilerSelection, ReporterKind};
