//! Per-invocation context threaded through the pipeline.
//!
//! Verbosity and color policy are explicit state, not process globals, so
//! the worker leg stays re-entrant within one process.

const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

/// Invocation-wide settings shared by the pipeline components.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    /// `-v` count; 1 shows executed commands, 2 and up gets chattier.
    pub verbose: u32,
    pub color: bool,
}

impl Session {
    pub fn new(verbose: u32, color: bool) -> Self {
        Self { verbose, color }
    }

    /// Echo an external command about to run, shell-quoted, when verbosity
    /// reaches `level`. Returns whether anything was printed.
    pub fn log_command(&self, argv: &[String], level: u32) -> bool {
        if self.verbose < level {
            return false;
        }
        let msg = format!(">> {}", shell_join(argv));
        if self.color {
            println!("{BLUE}{msg}{RESET}");
        } else {
            println!("{msg}");
        }
        true
    }
}

/// Join an argv into a copy-pasteable shell line.
fn shell_join(argv: &[String]) -> String {
    argv.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"@%+=:,./-_".contains(&b));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
