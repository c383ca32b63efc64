//! Progress and result rendering.
//!
//! The pipeline calls a [`Reporter`] at fixed extension points and owns no
//! rendering logic itself. Two implementations exist: a human terminal
//! reporter and a buffered JSON reporter whose whole payload is emitted at
//! [`Reporter::finalize`] (the grading service consumes that stream).

use serde_json::json;

use crate::compiler::CompilationResult;
use crate::runner::RunnerOutput;
use crate::verdict::Verdict;

pub use grader_protocol::ReporterKind;

/// Message styles a reporter may distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Title,
    Msg,
    Error,
    Output,
}

/// Rendering extension points called by the command pipeline.
pub trait Reporter {
    fn log(&mut self, msg: &str, style: Style);

    /// A compile finished; called for failures too, with captured output.
    fn compilation(&mut self, group: &str, result: &CompilationResult);

    /// One test finished.
    fn test(&mut self, name: &str, output: &RunnerOutput);

    /// One benchmark finished.
    fn benchmark(&mut self, name: &str, output: &RunnerOutput);

    /// Free-form analysis artifact (e.g. generated assembly).
    fn analyze(&mut self, name: &str, text: &str);

    /// Flush anything buffered. Must be called exactly once, last.
    fn finalize(&mut self);
}

/// Build the reporter for a kind and color policy.
pub fn from_kind(kind: ReporterKind, color: bool) -> Box<dyn Reporter> {
    match kind {
        ReporterKind::Terminal => Box::new(TerminalReporter::new(color)),
        ReporterKind::Json => Box::new(JsonReporter::new()),
    }
}

const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Human-facing reporter.
pub struct TerminalReporter {
    color: bool,
}

impl TerminalReporter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn verdict_label(&self, verdict: Verdict) -> String {
        match verdict {
            Verdict::Pass | Verdict::Done => self.paint(verdict.as_str(), GREEN),
            Verdict::Fail => self.paint(verdict.as_str(), RED),
            Verdict::Timeout => self.paint(verdict.as_str(), YELLOW),
            Verdict::Error => self.paint(verdict.as_str(), RED),
        }
    }
}

impl Reporter for TerminalReporter {
    fn log(&mut self, msg: &str, style: Style) {
        match style {
            Style::Title => println!("{}", self.paint(msg, BOLD)),
            Style::Error => eprintln!("{}", self.paint(msg, RED)),
            Style::Msg | Style::Output => println!("{msg}"),
        }
    }

    fn compilation(&mut self, _group: &str, result: &CompilationResult) {
        if !result.stdout.is_empty() {
            print!("{}", result.stdout);
        }
        if !result.stderr.is_empty() {
            eprint!("{}", result.stderr);
        }
        if !result.is_success() {
            self.log("Compilation failed", Style::Error);
        }
    }

    fn test(&mut self, name: &str, output: &RunnerOutput) {
        println!(
            "  {:30} {} ({:.3}s)",
            name,
            self.verdict_label(output.verdict),
            output.wall_time
        );
        if output.errors && !output.stderr.is_empty() {
            print!("{}", output.stderr);
        }
    }

    fn benchmark(&mut self, name: &str, output: &RunnerOutput) {
        let time = output.time.unwrap_or(output.wall_time);
        println!(
            "  {:30} {} {:.6}s",
            name,
            self.verdict_label(output.verdict),
            time
        );
        for (key, value) in &output.fields {
            println!("    {key:26} {value}");
        }
    }

    fn analyze(&mut self, _name: &str, text: &str) {
        println!("{text}");
    }

    fn finalize(&mut self) {
        if self.color {
            // Reset just in case a child left color state behind.
            print!("{RESET}");
        }
    }
}

/// Machine-readable reporter: buffers everything, prints one JSON document.
pub struct JsonReporter {
    events: Vec<serde_json::Value>,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Events accumulated so far (used by tests).
    pub fn events(&self) -> &[serde_json::Value] {
        &self.events
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for JsonReporter {
    fn log(&mut self, _msg: &str, _style: Style) {
        // Human chatter is not part of the machine stream.
    }

    fn compilation(&mut self, group: &str, result: &CompilationResult) {
        self.events.push(json!({
            "type": "compilation",
            "group": group,
            "success": result.is_success(),
            "stdout": result.stdout,
            "stderr": result.stderr,
        }));
    }

    fn test(&mut self, name: &str, output: &RunnerOutput) {
        self.events.push(json!({
            "type": "test",
            "name": name,
            "verdict": output.verdict.as_str(),
            "wall_time": output.wall_time,
            "errors": output.errors,
            "fields": output.fields,
            "stdout": output.stdout,
            "stderr": output.stderr,
        }));
    }

    fn benchmark(&mut self, name: &str, output: &RunnerOutput) {
        self.events.push(json!({
            "type": "benchmark",
            "name": name,
            "verdict": output.verdict.as_str(),
            "time": output.time.unwrap_or(output.wall_time),
            "errors": output.errors,
            "fields": output.fields,
        }));
    }

    fn analyze(&mut self, name: &str, text: &str) {
        self.events.push(json!({
            "type": "analysis",
            "name": name,
            "content": text,
        }));
    }

    fn finalize(&mut self) {
        let doc = json!({ "events": self.events });
        println!("{doc}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn sample_output(verdict: Verdict, errors: bool) -> RunnerOutput {
        RunnerOutput {
            verdict,
            errors,
            wall_time: 0.25,
            time: Some(0.2),
            stdout: String::new(),
            stderr: String::new(),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn json_reporter_buffers_until_finalize() {
        let mut reporter = JsonReporter::new();
        reporter.test("tests/001.txt", &sample_output(Verdict::Pass, false));
        reporter.benchmark("benchmarks/1.txt", &sample_output(Verdict::Done, false));
        assert_eq!(reporter.events().len(), 2);
        assert_eq!(reporter.events()[0]["verdict"], "pass");
        assert_eq!(reporter.events()[1]["type"], "benchmark");
    }

    #[test]
    fn json_reporter_records_compile_failures() {
        let mut reporter = JsonReporter::new();
        reporter.compilation(
            "test-plain",
            &CompilationResult {
                success: false,
                stdout: String::new(),
                stderr: "cp.cc:3: error: expected ';'".to_string(),
                binary: PathBuf::from("cp"),
            },
        );
        assert_eq!(reporter.events()[0]["success"], false);
        assert!(reporter.events()[0]["stderr"]
            .as_str()
            .unwrap()
            .contains("expected ';'"));
    }
}
