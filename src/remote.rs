//! Client leg of remote execution.
//!
//! Builds a self-sufficient envelope from the invocation (source and test
//! contents by value), submits it through [`crate::api::Api`], and relays
//! the worker's captured output verbatim. The relay is deliberately dumb:
//! rendering happened on the worker, so the client only strips the
//! exit-status trailing line and maps verdict tags to exit codes.

use std::io::Write;

use grader_protocol::{
    split_exit_code, CommandRequest, RemoteEnvelope, RemoteResult, RemoteSettings, RemoteVerdict,
    TestFile,
};

use crate::api::Api;
use crate::command::{command_from_name, expand_macro};
use crate::config::{ExerciseConfig, RemoteConfig};
use crate::error::GraderError;

/// Exit code used when the service's aggregate deadline was exhausted.
/// Distinct from per-test timeouts, which are ordinary command failures.
pub const REMOTE_TIMEOUT_EXIT_CODE: i32 = 42;

/// Explicit timeouts above this many seconds draw a warning before submit.
const TIMEOUT_WARNING_THRESHOLD: f64 = 10.0;

/// Run `command` remotely. Returns the process exit code to use.
pub fn exec_remote(
    config: &ExerciseConfig,
    remote: &RemoteConfig,
    settings: RemoteSettings,
    command: &str,
    args: &[String],
) -> Result<i32, GraderError> {
    let names = expand_macro(command, config.gpu);
    if names.is_empty() {
        return Err(GraderError::UnknownCommand(command.to_string()));
    }

    if settings.no_timeout || settings.timeout.is_some_and(|t| t > TIMEOUT_WARNING_THRESHOLD) {
        eprintln!(
            "Warning: The remote execution enforces one global deadline; \
             raising or disabling test timeouts might run into it."
        );
    }

    let source = std::fs::read_to_string(&config.source)
        .map_err(|_| GraderError::SourceMissing(config.source.display().to_string()))?;

    let mut commands = Vec::new();
    for name in &names {
        let spec = command_from_name(name, config.gpu)?;
        if !spec.allow_remote {
            return Err(GraderError::RemoteIneligible(command.to_string()));
        }
        let mut tests = Vec::new();
        for test in spec.collect_tests(&config.base_dir, args)? {
            let path = test.display().to_string();
            let content = std::fs::read_to_string(config.base_dir.join(&test))
                .map_err(|_| GraderError::TestMissing(path.clone()))?;
            tests.push(TestFile { path, content });
        }
        commands.push(CommandRequest {
            name: spec.name.to_string(),
            tests,
        });
    }

    let color = settings.color;
    let envelope = RemoteEnvelope {
        settings,
        source,
        commands,
    };

    let grader = remote
        .remote_grader
        .get_optional()
        .ok_or(GraderError::RemoteUnsupported)?
        .to_string();
    let token = remote.api_token.get_required()?.to_string();
    let api = Api::new(remote.endpoint_argv()?, &token);

    match api.test_connection() {
        Ok(_) => {}
        Err(err) if err.is_auth_failure() => {
            return Err(GraderError::Config(
                remote.api_token.explain("was rejected by the service"),
            ));
        }
        Err(err) => return Err(err.into()),
    }

    if let Some(limit) = remote
        .remote_max_timeout
        .get_optional()
        .and_then(|v| v.parse::<f64>().ok())
    {
        let sum = envelope.declared_timeout_sum();
        if sum > limit {
            eprintln!(
                "Warning: The total timeout of all tests you have submitted is {sum:.1}s, \
                 while the remote execution will time out after {limit:.1}s."
            );
        }
    }

    let results = api.submit_run(&grader, &envelope)?;
    if results.is_empty() {
        eprintln!(
            "No results were received from the server. This is likely a bug \
             in the grader; please report it to the course staff."
        );
        return Ok(1);
    }

    let (text, code) = relay(&results, color);
    print!("{text}");
    let _ = std::io::stdout().flush();
    Ok(code)
}

/// Turn the result list into the text to print and the exit code to use.
/// Every received result is printed, in submission order; the first
/// significant exit code wins.
fn relay(results: &[RemoteResult], color: bool) -> (String, i32) {
    let mut text = String::new();
    let mut code = 0;

    for result in results {
        match result.verdict {
            RemoteVerdict::Success => {
                let (output, result_code) = split_exit_code(&result.output);
                push_block(&mut text, output);
                if code == 0 {
                    code = result_code;
                }
            }
            RemoteVerdict::Timeout => {
                push_block(&mut text, &result.output);
                push_block(
                    &mut text,
                    "Error: The global timeout was exhausted while running your command.\n\
                     Try running fewer tests at a time, or make your implementation faster.",
                );
                if code == 0 {
                    code = REMOTE_TIMEOUT_EXIT_CODE;
                }
            }
            RemoteVerdict::Error => {
                push_block(
                    &mut text,
                    "Error: Something went wrong while running your command remotely.\n\
                     This is what was received from the server:",
                );
                push_block(&mut text, &result.output);
                if code == 0 {
                    code = 1;
                }
            }
        }
    }

    if color {
        // Workers may be killed mid-escape-sequence; restore the terminal.
        text.push_str("\x1b[0m");
    }
    (text, code)
}

fn push_block(text: &mut String, block: &str) {
    if block.is_empty() {
        return;
    }
    text.push_str(block);
    if !block.ends_with('\n') {
        text.push('\n');
    }
}
