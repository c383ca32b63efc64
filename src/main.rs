//! Grader CLI
//!
//! Entry point for the `grader` command-line tool.

use std::io::IsTerminal;
use std::path::Path;
use std::process;

use clap::Parser;

use exercise_grader::command::{command_from_name, expand_macro, RunOptions};
use exercise_grader::compiler::resolve_selection;
use exercise_grader::config::{ExerciseConfig, RemoteConfig};
use exercise_grader::error::GraderError;
use exercise_grader::{cancel, remote, reporter, Session};
use grader_protocol::{CompilerFamily, CompilerSelection, RemoteSettings, ReporterKind};

#[derive(Parser)]
#[command(name = "grader")]
#[command(about = "Compile and grade course exercise submissions", version)]
struct Cli {
    /// Command to run (e.g. test, test-plain, benchmark, assembly, demo)
    command: String,

    /// Test files or glob patterns; arguments for the demo commands
    #[arg(trailing_var_arg = true)]
    tests: Vec<String>,

    /// Override the per-test timeout, in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<f64>,

    /// Disable per-test timeouts entirely
    #[arg(long)]
    no_timeout: bool,

    /// Keep running tests after the first failure
    #[arg(long)]
    ignore_errors: bool,

    /// Run the command on the course's remote machines
    #[arg(long)]
    remote: bool,

    /// Emit one machine-readable JSON document instead of terminal output
    #[arg(long)]
    json: bool,

    /// Increase verbosity; shows executed commands
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use gcc, optionally naming the exact binary
    #[arg(long, value_name = "NAME", num_args = 0..=1, default_missing_value = "", group = "compiler")]
    gcc: Option<String>,

    /// Use clang, optionally naming the exact binary
    #[arg(long, value_name = "NAME", num_args = 0..=1, default_missing_value = "", group = "compiler")]
    clang: Option<String>,

    /// Use nvcc, optionally naming the exact binary
    #[arg(long, value_name = "NAME", num_args = 0..=1, default_missing_value = "", group = "compiler")]
    nvcc: Option<String>,

    /// Grade this source file instead of the configured one
    #[arg(long, value_name = "PATH")]
    file: Option<std::path::PathBuf>,

    /// Name the compiled binary differently
    #[arg(long, value_name = "NAME")]
    binary: Option<String>,

    /// Profile benchmarks under nvprof even on CPU exercises
    #[arg(long, overrides_with = "no_nvprof")]
    nvprof: bool,

    /// Run benchmarks without the nvprof wrapper
    #[arg(long, overrides_with = "nvprof")]
    no_nvprof: bool,
}

impl Cli {
    fn nvprof_override(&self) -> Option<bool> {
        if self.nvprof {
            Some(true)
        } else if self.no_nvprof {
            Some(false)
        } else {
            None
        }
    }

    fn compiler_selection(&self) -> Option<CompilerSelection> {
        let (family, name) = if let Some(name) = &self.gcc {
            (CompilerFamily::Gcc, name)
        } else if let Some(name) = &self.clang {
            (CompilerFamily::Clang, name)
        } else if let Some(name) = &self.nvcc {
            (CompilerFamily::Nvcc, name)
        } else {
            return None;
        };
        Some(CompilerSelection {
            family,
            name: name.clone(),
        })
    }
}

fn main() {
    let cli = Cli::parse();
    cancel::install();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32, GraderError> {
    let base_dir = Path::new(".");
    let mut config = ExerciseConfig::load(base_dir)?;
    config.ignore_errors = cli.ignore_errors;
    if let Some(file) = &cli.file {
        config.override_source(file);
    }
    if let Some(binary) = &cli.binary {
        config.override_binary(binary);
    }

    let color = !cli.json && std::io::stdout().is_terminal();
    let selection = cli.compiler_selection();

    if cli.remote {
        let remote_config = RemoteConfig::for_exercise(base_dir)?;
        let settings = RemoteSettings {
            verbose: cli.verbose as u32,
            reporter: if cli.json {
                ReporterKind::Json
            } else {
                ReporterKind::Terminal
            },
            ignore_errors: cli.ignore_errors,
            timeout: cli.timeout,
            no_timeout: cli.no_timeout,
            compiler: selection,
            color,
        };
        return remote::exec_remote(&config, &remote_config, settings, &cli.command, &cli.tests);
    }

    let compiler = match selection {
        Some(selection) => resolve_selection(selection.family, &selection.name)?,
        None => config.find_compiler().ok_or(GraderError::NoCompiler)?,
    };

    let session = Session::new(cli.verbose as u32, color);
    let mut reporter = reporter::from_kind(
        if cli.json {
            ReporterKind::Json
        } else {
            ReporterKind::Terminal
        },
        color,
    );
    let options = RunOptions {
        cli_timeout: cli.timeout,
        no_timeout: cli.no_timeout,
        nvprof: cli.nvprof_override(),
    };

    let names = expand_macro(&cli.command, config.gpu);
    if names.is_empty() {
        return Err(GraderError::UnknownCommand(cli.command));
    }

    let mut all_ok = true;
    for name in names {
        let spec = command_from_name(name, config.gpu)?;
        let ok = spec.exec(
            &session,
            reporter.as_mut(),
            &config,
            &compiler,
            &cli.tests,
            options,
        )?;
        all_ok &= ok;
        if !ok && !config.ignore_errors {
            break;
        }
    }
    reporter.finalize();

    Ok(if all_ok { 0 } else { 1 })
}
