//! Command registry and the grading pipeline.
//!
//! Every verification mode is a data entry in [`COMMANDS`]; the pipeline in
//! [`CommandSpec::exec`] interprets the entry instead of each command
//! carrying its own control flow. Adding a mode means adding a row, not a
//! type.

use std::path::{Path, PathBuf};

use globset::Glob;
use walkdir::WalkDir;

use grader_protocol::embedded_timeout;

use crate::compiler::{Compiler, CompilerFamily};
use crate::config::ExerciseConfig;
use crate::error::GraderError;
use crate::reporter::{Reporter, Style};
use crate::runner::{spawn_capture, Measure, Runner, RunnerKind, RunnerOutput};
use crate::session::Session;

/// Generated assembly beyond this many bytes is not shown inline.
const MAX_ASSEMBLY_OUTPUT: usize = 600_000;

/// Which exercise flavor a command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Cpu,
    Gpu,
    Any,
}

impl Flavor {
    fn accepts(self, gpu: bool) -> bool {
        match self {
            Flavor::Any => true,
            Flavor::Cpu => !gpu,
            Flavor::Gpu => gpu,
        }
    }
}

/// How default input files are discovered when none are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discovery {
    Tests,
    /// Union of both folders; the plain run also verifies benchmarks.
    TestsAndBenchmarks,
    /// Prefer dedicated memcheck tests, fall back to medium-sized ones.
    Memcheck,
    Benchmarks,
    /// Positional arguments are not test files (compile, demo).
    None,
}

/// Extra compile flags per verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prepare {
    /// `-O3 -g`, the default optimized build.
    Optimized,
    /// Address + undefined-behavior sanitizers.
    Asan,
    /// Pattern-initialize stack variables to flush out uninitialized reads.
    Uninit,
    /// Debug info and line tables for the device memory checker.
    MemcheckFlags,
    /// Unoptimized with debug info.
    Debug,
}

impl Prepare {
    fn apply(self, compiler: Compiler, gpu: bool) -> Compiler {
        match self {
            Prepare::Optimized => compiler.add_flags(["-O3", "-g"]),
            Prepare::Asan => {
                // Sanitized builds stay unoptimized so reports map to lines.
                let compiler = compiler.add_flag("-g");
                if gpu {
                    compiler.add_flags([
                        "-Xcompiler",
                        "-fsanitize=address",
                        "-Xcompiler",
                        "-fsanitize=undefined",
                    ])
                } else {
                    compiler.add_flags(["-fsanitize=address", "-fsanitize=undefined"])
                }
            }
            Prepare::Uninit => {
                compiler.add_flags(["-O3", "-g", "-ftrivial-auto-var-init=pattern"])
            }
            Prepare::MemcheckFlags => {
                compiler.add_flags(["-O3", "-g", "-Xcompiler", "-rdynamic", "-lineinfo"])
            }
            Prepare::Debug => compiler.add_flag("-g"),
        }
    }
}

/// What the command does after (or instead of) compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Test { prepare: Prepare, runner: RunnerKind },
    Benchmark { measure: Measure },
    Compile { prepare: Prepare },
    Assembly,
    Demo { run: bool },
}

/// One registry entry.
#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub title: &'static str,
    pub flavor: Flavor,
    /// Whether the command may be shipped to a remote worker.
    pub allow_remote: bool,
    discovery: Discovery,
    kind: CommandKind,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "test-plain",
        title: "Running tests (plain)",
        flavor: Flavor::Any,
        allow_remote: true,
        discovery: Discovery::TestsAndBenchmarks,
        kind: CommandKind::Test {
            prepare: Prepare::Optimized,
            runner: RunnerKind::Plain,
        },
    },
    CommandSpec {
        name: "test-asan",
        title: "Running tests (address sanitizer)",
        flavor: Flavor::Any,
        allow_remote: true,
        discovery: Discovery::Tests,
        kind: CommandKind::Test {
            prepare: Prepare::Asan,
            runner: RunnerKind::Asan,
        },
    },
    CommandSpec {
        name: "test-uninit",
        title: "Running tests (uninitialized variables)",
        flavor: Flavor::Cpu,
        allow_remote: true,
        discovery: Discovery::Tests,
        kind: CommandKind::Test {
            prepare: Prepare::Uninit,
            runner: RunnerKind::Plain,
        },
    },
    CommandSpec {
        name: "test-memcheck-memcheck",
        title: "Running tests (cuda-memcheck: memcheck)",
        flavor: Flavor::Gpu,
        allow_remote: true,
        discovery: Discovery::Memcheck,
        kind: CommandKind::Test {
            prepare: Prepare::MemcheckFlags,
            runner: RunnerKind::Memcheck("memcheck"),
        },
    },
    CommandSpec {
        name: "test-memcheck-racecheck",
        title: "Running tests (cuda-memcheck: racecheck)",
        flavor: Flavor::Gpu,
        allow_remote: true,
        discovery: Discovery::Memcheck,
        kind: CommandKind::Test {
            prepare: Prepare::MemcheckFlags,
            runner: RunnerKind::Memcheck("racecheck"),
        },
    },
    CommandSpec {
        name: "test-memcheck-initcheck",
        title: "Running tests (cuda-memcheck: initcheck)",
        flavor: Flavor::Gpu,
        allow_remote: true,
        discovery: Discovery::Memcheck,
        kind: CommandKind::Test {
            prepare: Prepare::MemcheckFlags,
            runner: RunnerKind::Memcheck("initcheck"),
        },
    },
    CommandSpec {
        name: "test-memcheck-synccheck",
        title: "Running tests (cuda-memcheck: synccheck)",
        flavor: Flavor::Gpu,
        allow_remote: true,
        discovery: Discovery::Memcheck,
        kind: CommandKind::Test {
            prepare: Prepare::MemcheckFlags,
            runner: RunnerKind::Memcheck("synccheck"),
        },
    },
    CommandSpec {
        name: "benchmark-all",
        title: "Running benchmarks",
        flavor: Flavor::Any,
        allow_remote: true,
        discovery: Discovery::Benchmarks,
        kind: CommandKind::Benchmark {
            measure: Measure::Default,
        },
    },
    CommandSpec {
        name: "benchmark-cache",
        title: "Running benchmarks (cache counters)",
        flavor: Flavor::Any,
        allow_remote: true,
        discovery: Discovery::Benchmarks,
        kind: CommandKind::Benchmark {
            measure: Measure::Cache,
        },
    },
    CommandSpec {
        name: "compile",
        title: "Compiling",
        flavor: Flavor::Any,
        allow_remote: true,
        discovery: Discovery::None,
        kind: CommandKind::Compile {
            prepare: Prepare::Optimized,
        },
    },
    CommandSpec {
        name: "compile-debug",
        title: "Compiling (debug build)",
        flavor: Flavor::Any,
        allow_remote: true,
        discovery: Discovery::None,
        kind: CommandKind::Compile {
            prepare: Prepare::Debug,
        },
    },
    CommandSpec {
        name: "assembly",
        title: "Generating assembly",
        flavor: Flavor::Cpu,
        allow_remote: true,
        discovery: Discovery::None,
        kind: CommandKind::Assembly,
    },
    CommandSpec {
        name: "compile-demo",
        title: "Compiling demo",
        flavor: Flavor::Any,
        allow_remote: false,
        discovery: Discovery::None,
        kind: CommandKind::Demo { run: false },
    },
    CommandSpec {
        name: "demo",
        title: "Running demo",
        flavor: Flavor::Any,
        allow_remote: false,
        discovery: Discovery::None,
        kind: CommandKind::Demo { run: true },
    },
];

/// Expand a macro command into concrete registry names, in execution order.
/// Non-macro names expand to themselves.
pub fn expand_macro(name: &str, gpu: bool) -> Vec<&'static str> {
    match name {
        "test" => {
            if gpu {
                vec![
                    "test-asan",
                    "test-memcheck-memcheck",
                    "test-memcheck-initcheck",
                    "test-memcheck-synccheck",
                    "test-plain",
                ]
            } else {
                vec!["test-asan", "test-uninit", "test-plain"]
            }
        }
        "test-memcheck" => vec![
            "test-memcheck-memcheck",
            "test-memcheck-racecheck",
            "test-memcheck-initcheck",
            "test-memcheck-synccheck",
        ],
        "benchmark" => vec!["benchmark-all"],
        other => COMMANDS
            .iter()
            .filter(|c| c.name == other)
            .map(|c| c.name)
            .collect(),
    }
}

/// Look up a registry entry by name, checking it applies to this flavor.
pub fn command_from_name(name: &str, gpu: bool) -> Result<&'static CommandSpec, GraderError> {
    COMMANDS
        .iter()
        .find(|c| c.name == name && c.flavor.accepts(gpu))
        .ok_or_else(|| GraderError::UnknownCommand(name.to_string()))
}

/// Resolve the timeout for one test file.
///
/// Precedence: an explicit `--timeout` beats `--no-timeout`, which beats a
/// `timeout X` directive on the test file's first line. No source means no
/// timeout.
pub fn resolve_timeout(
    test: &Path,
    cli_timeout: Option<f64>,
    no_timeout: bool,
) -> Option<f64> {
    if cli_timeout.is_some() {
        return cli_timeout;
    }
    if no_timeout {
        return None;
    }
    std::fs::read_to_string(test)
        .ok()
        .and_then(|content| embedded_timeout(&content))
}

/// Whether the per-test loop should move on after `output`.
fn should_continue(output: &RunnerOutput, ignore_errors: bool) -> bool {
    output.run_successful() || ignore_errors
}

/// Per-invocation flags, shared by every command a macro expands to.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub cli_timeout: Option<f64>,
    pub no_timeout: bool,
    /// `--nvprof` / `--no-nvprof`; `None` follows the exercise flavor.
    pub nvprof: Option<bool>,
}

/// Benchmarks profile under nvprof on GPU exercises unless overridden.
fn benchmark_runner_kind(gpu: bool, nvprof: Option<bool>) -> RunnerKind {
    if nvprof.unwrap_or(gpu) {
        RunnerKind::Nvprof
    } else {
        RunnerKind::Plain
    }
}

fn glob_under(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, GraderError> {
    let matcher = Glob::new(pattern)
        .map_err(|e| GraderError::Config(format!("Bad test pattern {pattern}: {e}")))?
        .compile_matcher();
    let mut found = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(root) {
            Ok(p) => p,
            Err(_) => continue,
        };
        if matcher.is_match(relative) {
            found.push(relative.to_path_buf());
        }
    }
    found.sort();
    Ok(found)
}

impl CommandSpec {
    /// Resolve the input files for this command from the user's positional
    /// arguments, or discover defaults when none were given.
    pub fn collect_tests(
        &self,
        root: &Path,
        user: &[String],
    ) -> Result<Vec<PathBuf>, GraderError> {
        match self.discovery {
            Discovery::None => Ok(Vec::new()),
            Discovery::Tests => self.collect_matching(root, user, &["tests/*"], "tests"),
            Discovery::TestsAndBenchmarks => {
                if !user.is_empty() {
                    return self.collect_matching(root, user, &[], "tests");
                }
                let mut found = glob_under(root, "tests/*")?;
                found.extend(glob_under(root, "benchmarks/*")?);
                if found.is_empty() {
                    return Err(GraderError::NoTests(
                        "Couldn't find default tests. Have you accidentally deleted \
                         tests or benchmarks folder, or its contents?"
                            .to_string(),
                    ));
                }
                Ok(found)
            }
            Discovery::Memcheck => {
                self.collect_matching(root, user, &["tests/*memcheck*", "tests/*medium*"], "tests")
            }
            Discovery::Benchmarks => {
                self.collect_matching(root, user, &["benchmarks/*"], "benchmarks")
            }
        }
    }

    fn collect_matching(
        &self,
        root: &Path,
        user: &[String],
        defaults: &[&str],
        folder: &str,
    ) -> Result<Vec<PathBuf>, GraderError> {
        if !user.is_empty() {
            // Arguments run in the order given; only glob expansions sort.
            let mut found = Vec::new();
            for arg in user {
                if root.join(arg).is_file() {
                    found.push(PathBuf::from(arg));
                } else {
                    found.extend(glob_under(root, arg)?);
                }
            }
            if found.is_empty() {
                return Err(GraderError::NoTests(format!(
                    "The specified tests ({}) don't match any files. \
                     Did you mistype the file name?",
                    user.join(", ")
                )));
            }
            return Ok(found);
        }

        for pattern in defaults {
            let found = glob_under(root, pattern)?;
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Err(GraderError::NoTests(format!(
            "Couldn't find default tests. Have you accidentally deleted \
             {folder} folder, or its contents?"
        )))
    }

    /// Run this command end to end. Returns `Ok(true)` when everything
    /// passed; `Ok(false)` is a failed command (exit 1), `Err` a setup
    /// problem that aborts the whole invocation.
    pub fn exec(
        &self,
        session: &Session,
        reporter: &mut dyn Reporter,
        config: &ExerciseConfig,
        compiler: &Compiler,
        args: &[String],
        options: RunOptions,
    ) -> Result<bool, GraderError> {
        reporter.log(self.title, Style::Title);

        if !config.source.is_file() {
            return Err(GraderError::SourceMissing(
                config.source.display().to_string(),
            ));
        }

        match self.kind {
            CommandKind::Test { prepare, runner } => self.exec_tests(
                session, reporter, config, compiler, args, options, prepare, runner,
            ),
            CommandKind::Benchmark { measure } => self.exec_benchmarks(
                session, reporter, config, compiler, args, options, measure,
            ),
            CommandKind::Compile { prepare } => {
                let result = self.build(session, config, compiler, prepare, &config.binary)?;
                reporter.compilation(self.name, &result);
                Ok(result.is_success())
            }
            CommandKind::Assembly => self.exec_assembly(session, reporter, config, compiler),
            CommandKind::Demo { run } => {
                self.exec_demo(session, reporter, config, compiler, args, run)
            }
        }
    }

    /// Compile the test driver together with the submission.
    fn build(
        &self,
        session: &Session,
        config: &ExerciseConfig,
        compiler: &Compiler,
        prepare: Prepare,
        out_file: &Path,
    ) -> Result<crate::compiler::CompilationResult, GraderError> {
        let invocation = prepare
            .apply(config.common_flags(compiler.clone()), config.gpu)
            .add_source(&config.tester)
            .add_source(&config.source);
        Ok(invocation.compile(session, out_file)?)
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_tests(
        &self,
        session: &Session,
        reporter: &mut dyn Reporter,
        config: &ExerciseConfig,
        compiler: &Compiler,
        args: &[String],
        options: RunOptions,
        prepare: Prepare,
        runner_kind: RunnerKind,
    ) -> Result<bool, GraderError> {
        if prepare == Prepare::Uninit && !uninit_supported(compiler) {
            return self.uninit_too_old(reporter, config, compiler);
        }

        let tests = self.collect_tests(&config.base_dir, args)?;
        let result = self.build(session, config, compiler, prepare, &config.binary)?;
        reporter.compilation(self.name, &result);
        if !result.is_success() {
            return Ok(false);
        }

        let mut runner = Runner::new(runner_kind);
        if prepare == Prepare::Asan && config.gpu {
            // Device runtime reserves memory where asan wants its shadow.
            runner.set_env(
                "ASAN_OPTIONS",
                "protect_shadow_gap=0:replace_intrin=0:detect_leaks=0",
            );
        }

        let cwd = config.binary_dir();
        let mut all_ok = true;
        for test in &tests {
            let timeout = resolve_timeout(
                &config.base_dir.join(test),
                options.cli_timeout,
                options.no_timeout,
            );
            let output = runner.run(
                session,
                &cwd,
                &config.test_command(test),
                timeout,
                None,
            )?;
            reporter.test(&test.display().to_string(), &output);
            all_ok &= output.run_successful();
            if !should_continue(&output, config.ignore_errors) {
                break;
            }
        }
        Ok(all_ok)
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_benchmarks(
        &self,
        session: &Session,
        reporter: &mut dyn Reporter,
        config: &ExerciseConfig,
        compiler: &Compiler,
        args: &[String],
        options: RunOptions,
        measure: Measure,
    ) -> Result<bool, GraderError> {
        let benchmarks = self.collect_tests(&config.base_dir, args)?;
        let result = self.build(session, config, compiler, Prepare::Optimized, &config.binary)?;
        reporter.compilation(self.name, &result);
        if !result.is_success() {
            return Ok(false);
        }

        let runner = Runner::new(benchmark_runner_kind(config.gpu, options.nvprof));
        let cwd = config.binary_dir();
        let mut all_ok = true;
        for benchmark in &benchmarks {
            let timeout = resolve_timeout(
                &config.base_dir.join(benchmark),
                options.cli_timeout,
                options.no_timeout,
            );
            let output = runner.run(
                session,
                &cwd,
                &config.benchmark_command(benchmark),
                timeout,
                Some(measure),
            )?;
            reporter.benchmark(&benchmark.display().to_string(), &output);
            all_ok &= output.run_successful();
            if !should_continue(&output, config.ignore_errors) {
                break;
            }
        }
        Ok(all_ok)
    }

    fn exec_assembly(
        &self,
        session: &Session,
        reporter: &mut dyn Reporter,
        config: &ExerciseConfig,
        compiler: &Compiler,
    ) -> Result<bool, GraderError> {
        let out_file = config.binary.with_extension("s");
        let invocation = config
            .common_flags(compiler.clone())
            .add_flags(["-O3", "-S", "-fverbose-asm"])
            .add_source(&config.source);
        let result = invocation.compile(session, &out_file)?;
        reporter.compilation(self.name, &result);
        if !result.is_success() {
            return Ok(false);
        }

        let text = std::fs::read_to_string(&out_file)?;
        reporter.analyze(self.name, &assembly_display(text, &out_file));
        Ok(true)
    }

    fn exec_demo(
        &self,
        session: &Session,
        reporter: &mut dyn Reporter,
        config: &ExerciseConfig,
        compiler: &Compiler,
        args: &[String],
        run: bool,
    ) -> Result<bool, GraderError> {
        let Some(demo) = config.demo.as_ref() else {
            return Err(GraderError::Config(
                "This task does not include a demo".to_string(),
            ));
        };

        let invocation = Prepare::Optimized
            .apply(config.common_flags(compiler.clone()), config.gpu)
            .add_flags(config.demo_flags.iter().cloned())
            .add_source(demo)
            .add_source(&config.source);
        let result = invocation.compile(session, &config.demo_binary)?;
        reporter.compilation(self.name, &result);
        if !result.is_success() {
            return Ok(false);
        }
        if !run {
            return Ok(true);
        }

        let argv = config.demo_command(args);
        session.log_command(&argv, 1);
        let capture = spawn_capture(&argv, &config.binary_dir(), None, &[])?;
        if !capture.stdout.is_empty() {
            reporter.log(&config.demo_output(&capture.stdout), Style::Output);
        }
        if !capture.stderr.is_empty() {
            reporter.log(&capture.stderr, Style::Error);
        }
        if !capture.success {
            let code = capture.exit_code.unwrap_or(-1);
            reporter.log(
                &format!("demo returned with error code {code}"),
                Style::Error,
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn uninit_too_old(
        &self,
        reporter: &mut dyn Reporter,
        config: &ExerciseConfig,
        compiler: &Compiler,
    ) -> Result<bool, GraderError> {
        reporter.log(
            &format!("The compiler {compiler} is too old to support this check."),
            Style::Error,
        );
        reporter.log(
            "test-uninit requires g++ version >= 12 or clang++ version >= 8",
            Style::Error,
        );
        if !config.on_remote {
            reporter.log(
                "Skipping this check; consider running it with '--remote'.",
                Style::Msg,
            );
            return Ok(true);
        }
        Ok(config.ignore_errors)
    }
}

/// Oversized assembly is pointless to scroll through; point at the file
/// on disk instead of flooding the terminal.
fn assembly_display(text: String, out_file: &Path) -> String {
    if text.len() > MAX_ASSEMBLY_OUTPUT {
        format!(
            "The generated assembly is too long to display. \
             You can find it in the file {}.",
            out_file.display()
        )
    } else {
        text
    }
}

/// Checks whether pattern stack initialization exists in this compiler.
fn uninit_supported(compiler: &Compiler) -> bool {
    match compiler.family() {
        CompilerFamily::Gcc => compiler.major() >= 12,
        CompilerFamily::Clang => compiler.major() >= 8,
        CompilerFamily::Nvcc => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Verdict;
    use std::collections::BTreeMap;
    use std::fs;

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<_> = COMMANDS.iter().map(|c| c.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), COMMANDS.len());
    }

    #[test]
    fn macro_expansion_cpu() {
        assert_eq!(
            expand_macro("test", false),
            vec!["test-asan", "test-uninit", "test-plain"]
        );
        assert_eq!(expand_macro("benchmark", false), vec!["benchmark-all"]);
        assert_eq!(expand_macro("test-plain", false), vec!["test-plain"]);
        assert!(expand_macro("no-such-command", false).is_empty());
    }

    #[test]
    fn macro_expansion_gpu_skips_racecheck_but_memcheck_macro_keeps_it() {
        let test = expand_macro("test", true);
        assert!(!test.contains(&"test-memcheck-racecheck"));
        assert!(test.contains(&"test-memcheck-synccheck"));
        assert_eq!(test.last(), Some(&"test-plain"));

        let memcheck = expand_macro("test-memcheck", true);
        assert!(memcheck.contains(&"test-memcheck-racecheck"));
        assert_eq!(memcheck.len(), 4);
    }

    #[test]
    fn flavor_gating_in_lookup() {
        assert!(command_from_name("test-uninit", false).is_ok());
        assert!(command_from_name("test-uninit", true).is_err());
        assert!(command_from_name("test-memcheck-memcheck", true).is_ok());
        assert!(command_from_name("test-memcheck-memcheck", false).is_err());
        assert!(command_from_name("nonsense", false).is_err());
    }

    #[test]
    fn timeout_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let test = dir.path().join("001.txt");
        fs::write(&test, "timeout 2.5\n100 100\n").unwrap();

        // explicit flag beats everything, including no-timeout
        assert_eq!(resolve_timeout(&test, Some(9.0), true), Some(9.0));
        assert_eq!(resolve_timeout(&test, Some(9.0), false), Some(9.0));
        // no-timeout beats the embedded directive
        assert_eq!(resolve_timeout(&test, None, true), None);
        // embedded directive applies otherwise
        assert_eq!(resolve_timeout(&test, None, false), Some(2.5));

        let plain = dir.path().join("002.txt");
        fs::write(&plain, "100 100\n").unwrap();
        assert_eq!(resolve_timeout(&plain, None, false), None);
    }

    #[test]
    fn default_discovery_finds_and_sorts_tests() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tests")).unwrap();
        fs::write(dir.path().join("tests/002.txt"), "").unwrap();
        fs::write(dir.path().join("tests/001.txt"), "").unwrap();
        let spec = command_from_name("test-plain", false).unwrap();
        let tests = spec.collect_tests(dir.path(), &[]).unwrap();
        assert_eq!(
            tests,
            vec![PathBuf::from("tests/001.txt"), PathBuf::from("tests/002.txt")]
        );
    }

    #[test]
    fn memcheck_discovery_prefers_dedicated_tests() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tests")).unwrap();
        fs::write(dir.path().join("tests/003-medium.txt"), "").unwrap();
        fs::write(dir.path().join("tests/007-memcheck.txt"), "").unwrap();
        let spec = command_from_name("test-memcheck-memcheck", true).unwrap();
        let tests = spec.collect_tests(dir.path(), &[]).unwrap();
        assert_eq!(tests, vec![PathBuf::from("tests/007-memcheck.txt")]);
    }

    #[test]
    fn memcheck_discovery_falls_back_to_medium() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tests")).unwrap();
        fs::write(dir.path().join("tests/003-medium.txt"), "").unwrap();
        fs::write(dir.path().join("tests/001-small.txt"), "").unwrap();
        let spec = command_from_name("test-memcheck-initcheck", true).unwrap();
        let tests = spec.collect_tests(dir.path(), &[]).unwrap();
        assert_eq!(tests, vec![PathBuf::from("tests/003-medium.txt")]);
    }

    #[test]
    fn explicit_test_arguments_must_match_something() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tests")).unwrap();
        fs::write(dir.path().join("tests/001.txt"), "").unwrap();
        let spec = command_from_name("test-plain", false).unwrap();

        let found = spec
            .collect_tests(dir.path(), &["tests/001.txt".to_string()])
            .unwrap();
        assert_eq!(found, vec![PathBuf::from("tests/001.txt")]);

        let err = spec
            .collect_tests(dir.path(), &["tests/999.txt".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("Did you mistype the file name?"));
    }

    #[test]
    fn explicit_arguments_keep_their_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tests")).unwrap();
        fs::write(dir.path().join("tests/001.txt"), "").unwrap();
        fs::write(dir.path().join("tests/002.txt"), "").unwrap();
        let spec = command_from_name("test-plain", false).unwrap();
        let found = spec
            .collect_tests(
                dir.path(),
                &["tests/002.txt".to_string(), "tests/001.txt".to_string()],
            )
            .unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("tests/002.txt"), PathBuf::from("tests/001.txt")]
        );
    }

    #[test]
    fn glob_arguments_expand() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tests")).unwrap();
        fs::write(dir.path().join("tests/001-small.txt"), "").unwrap();
        fs::write(dir.path().join("tests/002-large.txt"), "").unwrap();
        let spec = command_from_name("test-plain", false).unwrap();
        let found = spec
            .collect_tests(dir.path(), &["tests/*small*".to_string()])
            .unwrap();
        assert_eq!(found, vec![PathBuf::from("tests/001-small.txt")]);
    }

    #[test]
    fn missing_default_tests_explain_the_folder() {
        let dir = tempfile::tempdir().unwrap();
        let spec = command_from_name("benchmark-all", false).unwrap();
        let err = spec.collect_tests(dir.path(), &[]).unwrap_err();
        assert!(err.to_string().contains("benchmarks folder"));
    }

    #[test]
    fn plain_test_discovery_names_both_searched_folders() {
        let dir = tempfile::tempdir().unwrap();
        let spec = command_from_name("test-plain", false).unwrap();
        let err = spec.collect_tests(dir.path(), &[]).unwrap_err();
        assert!(err.to_string().contains("tests or benchmarks folder"));
    }

    #[test]
    fn sanitizer_build_carries_debug_info_without_optimization() {
        let base = Compiler::unchecked(CompilerFamily::Gcc, "g++", vec![12, 2, 0]);
        let argv = Prepare::Asan
            .apply(base, false)
            .command_line(Path::new("cp"));
        assert!(argv.contains(&"-g".to_string()));
        assert!(argv.contains(&"-fsanitize=address".to_string()));
        assert!(!argv.contains(&"-O3".to_string()));
    }

    #[test]
    fn benchmark_runner_follows_flavor_unless_overridden() {
        assert_eq!(benchmark_runner_kind(true, None), RunnerKind::Nvprof);
        assert_eq!(benchmark_runner_kind(false, None), RunnerKind::Plain);
        assert_eq!(benchmark_runner_kind(true, Some(false)), RunnerKind::Plain);
        assert_eq!(benchmark_runner_kind(false, Some(true)), RunnerKind::Nvprof);
    }

    #[test]
    fn oversized_assembly_becomes_a_pointer_to_the_file() {
        let short = assembly_display("mov eax, 1\n".to_string(), Path::new("cp.s"));
        assert_eq!(short, "mov eax, 1\n");

        let long = "x".repeat(MAX_ASSEMBLY_OUTPUT + 1);
        let shown = assembly_display(long, Path::new("cp.s"));
        assert!(shown.contains("too long to display"));
        assert!(shown.contains("cp.s"));
    }

    fn canned(verdict: Verdict, errors: bool) -> RunnerOutput {
        RunnerOutput {
            verdict,
            errors,
            wall_time: 0.1,
            time: None,
            stdout: String::new(),
            stderr: String::new(),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn loop_stops_on_failure_unless_errors_are_ignored() {
        let fail = canned(Verdict::Fail, false);
        assert!(!should_continue(&fail, false));
        assert!(should_continue(&fail, true));

        let pass = canned(Verdict::Pass, false);
        assert!(should_continue(&pass, false));

        let timeout = canned(Verdict::Timeout, true);
        assert!(!should_continue(&timeout, false));
        assert!(should_continue(&timeout, true));
    }

    #[test]
    fn uninit_capability_gate() {
        let old_gcc = Compiler::unchecked(CompilerFamily::Gcc, "g++-9", vec![9, 4, 0]);
        let new_gcc = Compiler::unchecked(CompilerFamily::Gcc, "g++", vec![12, 2, 0]);
        let clang = Compiler::unchecked(CompilerFamily::Clang, "clang++", vec![15, 0, 7]);
        assert!(!uninit_supported(&old_gcc));
        assert!(uninit_supported(&new_gcc));
        assert!(uninit_supported(&clang));
    }
}
