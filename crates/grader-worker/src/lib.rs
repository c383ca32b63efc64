//! Remote execution leg of the grading harness.
//!
//! The worker receives a self-sufficient envelope, materializes its files
//! into the prepared exercise directory (which already holds the test
//! driver and `grader.toml`), and drives the same command pipeline the
//! client would run locally. The derived exit status travels back inside
//! the captured output stream (see `grader_protocol::exit_code`).

pub mod sandbox;

use exercise_grader::command::{command_from_name, RunOptions};
use exercise_grader::compiler::resolve_selection;
use exercise_grader::config::ExerciseConfig;
use exercise_grader::error::GraderError;
use exercise_grader::{reporter, Session};
use grader_protocol::RemoteEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The envelope could not be understood. Worded for the student who
    /// sees it relayed verbatim.
    #[error(
        "It seems your version of the grader is incompatible. Please report \
         this message along with the command you ran to the course staff."
    )]
    Incompatible(#[source] serde_json::Error),

    #[error(transparent)]
    Grader(#[from] GraderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parse an envelope from its JSON text.
pub fn parse_envelope(text: &str) -> Result<RemoteEnvelope, WorkerError> {
    serde_json::from_str(text).map_err(WorkerError::Incompatible)
}

/// Execute every command in the envelope against the exercise at
/// `config.base_dir`. Returns whether the whole run succeeded; commands
/// after the first failure are skipped unless the envelope asks otherwise.
pub fn execute(envelope: &RemoteEnvelope, mut config: ExerciseConfig) -> Result<bool, WorkerError> {
    let settings = &envelope.settings;
    config.ignore_errors = settings.ignore_errors;
    config.on_remote = true;

    let source_name = config
        .source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "submission".to_string());
    sandbox::materialize(&config.base_dir, &source_name, envelope)?;

    let compiler = match &settings.compiler {
        Some(selection) => resolve_selection(selection.family, &selection.name)?,
        None => config.find_compiler().ok_or(GraderError::NoCompiler)?,
    };

    let session = Session::new(settings.verbose, settings.color);
    let mut reporter = reporter::from_kind(settings.reporter, settings.color);
    let options = RunOptions {
        cli_timeout: settings.timeout,
        no_timeout: settings.no_timeout,
        nvprof: None,
    };

    let mut all_ok = true;
    for command in &envelope.commands {
        let spec = command_from_name(&command.name, config.gpu)?;
        if !spec.allow_remote {
            return Err(GraderError::RemoteIneligible(command.name.clone()).into());
        }
        // Run the tests under the names materialization actually wrote.
        let args: Vec<String> = command
            .tests
            .iter()
            .map(|t| sandbox::clamp_relative(&t.path).display().to_string())
            .collect();
        let ok = spec.exec(&session, reporter.as_mut(), &config, &compiler, &args, options)?;
        all_ok &= ok;
        if !ok && !config.ignore_errors {
            break;
        }
    }
    reporter.finalize();

    Ok(all_ok)
}
