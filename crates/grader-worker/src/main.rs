//! Worker entry point.
//!
//! Invoked by the grading service with one argument: the path of a file
//! holding the JSON envelope. Everything student-facing goes to stdout,
//! which the service captures as the run's output; the derived exit status
//! is appended as a trailing line and the process itself always exits 0 so
//! transport-level failures stay distinguishable from command failures.

use std::path::Path;
use std::process;

use exercise_grader::config::ExerciseConfig;
use grader_protocol::append_exit_code;
use grader_worker::{execute, parse_envelope};

fn main() {
    let code = run();
    // Trailing status line, no final newline; the client strips it.
    print!("{}", append_exit_code("", code));
    process::exit(0);
}

fn run() -> i32 {
    let Some(envelope_path) = std::env::args().nth(1) else {
        println!("usage: grader-worker <envelope.json>");
        return 1;
    };

    let text = match std::fs::read_to_string(&envelope_path) {
        Ok(text) => text,
        Err(e) => {
            println!("Could not read envelope {envelope_path}: {e}");
            return 1;
        }
    };

    let envelope = match parse_envelope(&text) {
        Ok(envelope) => envelope,
        Err(e) => {
            println!("{e}");
            return 1;
        }
    };

    let config = match ExerciseConfig::load(Path::new(".")) {
        Ok(config) => config,
        Err(e) => {
            println!("{e}");
            return 1;
        }
    };

    match execute(&envelope, config) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            println!("{e}");
            1
        }
    }
}
