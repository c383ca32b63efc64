//! Process execution, timeout enforcement and outcome classification.
//!
//! The runner owns process lifecycle only; what the output *means* is the
//! output parser's business (see [`crate::verdict`]). Variants wrap the
//! target argv with a diagnostic tool and define their own mapping from
//! (exit status, captured text) to the infrastructure-error flag, because
//! tools like a device memory checker signal violations through their own
//! exit code.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::cancel;
use crate::session::Session;
use crate::verdict::{parse_output, Verdict};

/// Poll interval while racing a child against its deadline.
const WAIT_TICK: Duration = Duration::from_millis(5);

/// Which diagnostic wrapper (if any) surrounds the target command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
    /// Run the binary directly.
    Plain,
    /// Binary was built with address/UB sanitizers; may need env injected.
    Asan,
    /// Wrap with `cuda-memcheck --tool <tool>`.
    Memcheck(&'static str),
    /// Wrap with `nvprof` for profiled benchmarks.
    Nvprof,
}

/// Benchmark measurement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// Wall clock only.
    Default,
    /// Wall clock plus hardware cache counters (tester-side).
    Cache,
}

/// Result of executing one test or benchmark.
#[derive(Debug, Clone)]
pub struct RunnerOutput {
    pub verdict: Verdict,
    /// Infrastructure failure: timeout, crash, tool violation. Distinct
    /// from a failing verdict, which means the program ran and answered
    /// wrongly.
    pub errors: bool,
    /// Wall time measured by the runner, seconds.
    pub wall_time: f64,
    /// Time reported by the test driver itself, if present.
    pub time: Option<f64>,
    pub stdout: String,
    pub stderr: String,
    pub fields: BTreeMap<String, String>,
}

impl RunnerOutput {
    /// True when the run completed with a successful verdict.
    pub fn run_successful(&self) -> bool {
        self.verdict.is_success()
    }
}

/// A runner variant plus the environment its wrapped tool needs.
#[derive(Debug, Clone)]
pub struct Runner {
    kind: RunnerKind,
    env: Vec<(String, String)>,
}

impl Runner {
    pub fn new(kind: RunnerKind) -> Self {
        Self {
            kind,
            env: Vec::new(),
        }
    }

    /// Inject an environment variable for the child (e.g. `ASAN_OPTIONS`).
    pub fn set_env(&mut self, key: &str, value: &str) {
        self.env.push((key.to_string(), value.to_string()));
    }

    /// Prefix the target argv with the variant's wrapper tool.
    fn wrap(&self, argv: &[String]) -> Vec<String> {
        match self.kind {
            RunnerKind::Plain | RunnerKind::Asan => argv.to_vec(),
            RunnerKind::Memcheck(tool) => {
                let mut wrapped = vec![
                    "cuda-memcheck".to_string(),
                    "--tool".to_string(),
                    tool.to_string(),
                ];
                wrapped.extend(argv.iter().cloned());
                wrapped
            }
            RunnerKind::Nvprof => {
                let mut wrapped = vec!["nvprof".to_string()];
                wrapped.extend(argv.iter().cloned());
                wrapped
            }
        }
    }

    /// Execute `argv` from `cwd` with an optional wall-clock timeout.
    pub fn run(
        &self,
        session: &Session,
        cwd: &Path,
        argv: &[String],
        timeout: Option<f64>,
        measure: Option<Measure>,
    ) -> io::Result<RunnerOutput> {
        let wrapped = self.wrap(argv);
        session.log_command(&wrapped, 1);

        let mut env = self.env.clone();
        if let Some(measure) = measure {
            let value = match measure {
                Measure::Default => "default",
                Measure::Cache => "cache",
            };
            env.push(("GRADER_MEASURE".to_string(), value.to_string()));
        }

        let capture = spawn_capture(&wrapped, cwd, timeout, &env)?;
        Ok(self.classify(capture))
    }

    fn classify(&self, capture: Capture) -> RunnerOutput {
        let parsed = parse_output(&capture.stdout);

        let tool_violation = match self.kind {
            RunnerKind::Memcheck(_) => {
                memcheck_violation(&capture.stdout) || memcheck_violation(&capture.stderr)
            }
            _ => false,
        };
        let errors = capture.timed_out
            || !capture.success
            || tool_violation
            || parsed.verdict == Verdict::Error;

        let verdict = if capture.timed_out {
            Verdict::Timeout
        } else if errors && parsed.verdict.is_success() {
            // The driver claimed success but the process or tool disagreed.
            Verdict::Error
        } else {
            parsed.verdict
        };

        RunnerOutput {
            verdict,
            errors,
            wall_time: capture.wall_time,
            time: parsed.time,
            stdout: capture.stdout,
            stderr: capture.stderr,
            fields: parsed.fields,
        }
    }
}

/// `ERROR SUMMARY: n error(s)` with nonzero n in cuda-memcheck output.
fn memcheck_violation(text: &str) -> bool {
    text.lines()
        .filter_map(|line| line.split("ERROR SUMMARY:").nth(1))
        .filter_map(|rest| rest.split_whitespace().next())
        .any(|count| count.parse::<u64>().map(|n| n > 0).unwrap_or(false))
}

/// Raw result of one child execution.
#[derive(Debug)]
pub(crate) struct Capture {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub wall_time: f64,
    pub stdout: String,
    pub stderr: String,
}

/// Spawn, capture both streams, and race the child against `timeout`.
///
/// The child gets its own process group so a timeout (or an operator
/// interrupt) can kill wrapper-tool descendants along with it. No zombies:
/// the child is always reaped before this returns.
pub(crate) fn spawn_capture(
    argv: &[String],
    cwd: &Path,
    timeout: Option<f64>,
    env: &[(String, String)],
) -> io::Result<Capture> {
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in env {
        cmd.env(key, value);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let start = Instant::now();
    let mut child = cmd.spawn()?;
    cancel::register_child(child.id());

    // Drain pipes on threads so a chatty child cannot deadlock on a full
    // pipe while we wait for it.
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || read_all(stdout_pipe));
    let stderr_thread = std::thread::spawn(move || read_all(stderr_pipe));

    let (status, timed_out) = wait_with_deadline(&mut child, timeout)?;
    cancel::clear_child();

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    Ok(Capture {
        success: status.success() && !timed_out,
        exit_code: status.code(),
        timed_out,
        wall_time: start.elapsed().as_secs_f64(),
        stdout,
        stderr,
    })
}

fn read_all<R: Read>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn wait_with_deadline(
    child: &mut std::process::Child,
    timeout: Option<f64>,
) -> io::Result<(std::process::ExitStatus, bool)> {
    let deadline = timeout.map(|t| Instant::now() + Duration::from_secs_f64(t.max(0.0)));
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            cancel::kill_group(child.id());
            let _ = child.kill();
            let status = child.wait()?;
            return Ok((status, true));
        }
        std::thread::sleep(WAIT_TICK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(0, false)
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[test]
    fn passing_driver_output_classifies_as_pass() {
        let runner = Runner::new(RunnerKind::Plain);
        let out = runner
            .run(
                &session(),
                Path::new("."),
                &sh("printf 'time\\t0.5\\nresult\\tpass\\n'"),
                None,
                None,
            )
            .unwrap();
        assert_eq!(out.verdict, Verdict::Pass);
        assert!(!out.errors);
        assert!(out.run_successful());
        assert_eq!(out.time, Some(0.5));
    }

    #[cfg(unix)]
    #[test]
    fn failing_verdict_is_not_an_infrastructure_error() {
        let runner = Runner::new(RunnerKind::Plain);
        let out = runner
            .run(
                &session(),
                Path::new("."),
                &sh("printf 'result\\tfail\\n'"),
                None,
                None,
            )
            .unwrap();
        assert_eq!(out.verdict, Verdict::Fail);
        assert!(!out.errors);
        assert!(!out.run_successful());
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_an_error_even_with_pass_verdict() {
        let runner = Runner::new(RunnerKind::Plain);
        let out = runner
            .run(
                &session(),
                Path::new("."),
                &sh("printf 'result\\tpass\\n'; exit 3"),
                None,
                None,
            )
            .unwrap();
        assert!(out.errors);
        assert_eq!(out.verdict, Verdict::Error);
    }

    #[cfg(unix)]
    #[test]
    fn missing_protocol_output_is_an_error() {
        let runner = Runner::new(RunnerKind::Plain);
        let out = runner
            .run(&session(), Path::new("."), &sh("echo hello"), None, None)
            .unwrap();
        assert!(out.errors);
        assert_eq!(out.verdict, Verdict::Error);
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_the_child_and_classifies_as_timeout() {
        let runner = Runner::new(RunnerKind::Plain);
        let start = Instant::now();
        let out = runner
            .run(
                &session(),
                Path::new("."),
                &sh("sleep 30; printf 'result\\tpass\\n'"),
                Some(0.2),
                None,
            )
            .unwrap();
        assert!(out.errors);
        assert_eq!(out.verdict, Verdict::Timeout);
        // Killed at the deadline, nowhere near the sleep's 30s.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn environment_is_injected() {
        let mut runner = Runner::new(RunnerKind::Asan);
        runner.set_env("GRADER_TEST_MARK", "42");
        let out = runner
            .run(
                &session(),
                Path::new("."),
                &sh("printf 'mark\\t'; printf '%s\\n' \"$GRADER_TEST_MARK\"; printf 'result\\tpass\\n'"),
                None,
                None,
            )
            .unwrap();
        assert_eq!(out.fields.get("mark").map(String::as_str), Some("42"));
    }

    #[test]
    fn memcheck_wrapper_prefixes_argv() {
        let runner = Runner::new(RunnerKind::Memcheck("initcheck"));
        let wrapped = runner.wrap(&["./cp".to_string(), "--test".to_string()]);
        assert_eq!(
            wrapped,
            vec!["cuda-memcheck", "--tool", "initcheck", "./cp", "--test"]
        );
    }

    #[test]
    fn memcheck_violation_detection() {
        assert!(!memcheck_violation(
            "========= ERROR SUMMARY: 0 errors\n"
        ));
        assert!(memcheck_violation(
            "========= ERROR SUMMARY: 3 errors\n"
        ));
        assert!(!memcheck_violation("no summary at all"));
    }
}
