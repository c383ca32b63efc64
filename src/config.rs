//! Exercise and remote-service configuration.
//!
//! Each exercise directory carries a `grader.toml` describing the submission
//! (binary name, CPU/GPU flavor, OpenMP). Remote-service settings layer
//! three sources, later ones winning: the user's home config file, the
//! exercise's `[remote]` table, and environment variables. A missing
//! required setting produces an explanation listing every way to set it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::compiler::{
    find_clang_compiler, find_gcc_compiler, find_nvcc_compiler, Compiler,
};
use crate::error::GraderError;

/// Config file name looked up in the exercise directory.
pub const EXERCISE_CONFIG: &str = "grader.toml";

#[derive(Debug, Deserialize)]
struct RawExercise {
    binary: String,
    #[serde(default)]
    gpu: bool,
    #[serde(default)]
    openmp: bool,
    tester: Option<String>,
    demo: Option<String>,
    /// Extra link/compile flags only the demo build needs (e.g. `-lpng`).
    #[serde(default)]
    demo_flags: Vec<String>,
    #[serde(default)]
    remote: BTreeMap<String, String>,
}

/// Resolved per-exercise configuration.
#[derive(Debug, Clone)]
pub struct ExerciseConfig {
    pub base_dir: PathBuf,
    /// Submission source, `<binary>.cu` on GPU exercises else `<binary>.cc`.
    pub source: PathBuf,
    pub binary: PathBuf,
    /// The fixed test driver compiled together with the submission.
    pub tester: PathBuf,
    pub demo: Option<PathBuf>,
    pub demo_binary: PathBuf,
    pub demo_flags: Vec<String>,
    /// Post-processes captured demo stdout before display (e.g. rendering
    /// an image listing). Identity when unset.
    pub demo_post: Option<fn(&str) -> String>,
    pub gpu: bool,
    pub openmp: bool,
    /// Flag the test driver expects before the test file argument.
    pub test_flag: String,
    pub ignore_errors: bool,
    /// True on the worker leg; changes how degraded commands behave.
    pub on_remote: bool,
}

impl ExerciseConfig {
    /// Load `grader.toml` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, GraderError> {
        let path = dir.join(EXERCISE_CONFIG);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            GraderError::Config(format!(
                "Could not read {}: {e}",
                path.display()
            ))
        })?;
        let raw: RawExercise = toml::from_str(&text).map_err(|e| {
            GraderError::Config(format!(
                "Error while reading configuration file {}:\n{e}",
                path.display()
            ))
        })?;

        let extension = if raw.gpu { "cu" } else { "cc" };
        let source = dir.join(format!("{}.{extension}", raw.binary));
        let tester = dir.join(raw.tester.as_deref().unwrap_or("tester.cc"));
        let demo_file = dir.join(raw.demo.as_deref().unwrap_or("demo.cc"));
        let demo = demo_file.exists().then_some(demo_file);

        Ok(Self {
            base_dir: dir.to_path_buf(),
            source,
            binary: dir.join(&raw.binary),
            tester,
            demo,
            demo_binary: dir.join(format!("{}-demo", raw.binary)),
            demo_flags: raw.demo_flags,
            demo_post: None,
            gpu: raw.gpu,
            openmp: raw.openmp,
            test_flag: "--test".to_string(),
            ignore_errors: false,
            on_remote: false,
        })
    }

    /// Replace the submission source (the `--file` flag).
    pub fn override_source(&mut self, path: &Path) {
        self.source = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
    }

    /// Replace the output binary name (the `--binary` flag). The demo
    /// binary follows the same name.
    pub fn override_binary(&mut self, name: &str) {
        self.binary = self.base_dir.join(name);
        self.demo_binary = self.base_dir.join(format!("{name}-demo"));
    }

    /// Directory the compiled binary lives in; the runner's working dir.
    pub fn binary_dir(&self) -> PathBuf {
        self.binary
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn binary_invocation(&self, binary: &Path) -> String {
        let name = binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| binary.display().to_string());
        format!("./{name}")
    }

    /// Argv for running one test through the test driver.
    pub fn test_command(&self, test: &Path) -> Vec<String> {
        vec![
            self.binary_invocation(&self.binary),
            self.test_flag.clone(),
            test.display().to_string(),
        ]
    }

    /// Argv for running one benchmark.
    pub fn benchmark_command(&self, test: &Path) -> Vec<String> {
        vec![
            self.binary_invocation(&self.binary),
            test.display().to_string(),
        ]
    }

    /// Argv for the demo binary with user-supplied arguments.
    pub fn demo_command(&self, args: &[String]) -> Vec<String> {
        let mut argv = vec![self.binary_invocation(&self.demo_binary)];
        argv.extend(args.iter().cloned());
        argv
    }

    /// Demo stdout as it should be shown, through the post hook if set.
    pub fn demo_output(&self, raw: &str) -> String {
        match self.demo_post {
            Some(post) => post(raw),
            None => raw.to_string(),
        }
    }

    /// Flags shared by every compile of this exercise.
    pub fn common_flags(&self, mut compiler: Compiler) -> Compiler {
        let mut includes = vec![self.base_dir.join("include")];
        // Headers shipped with the grader installation itself.
        if let Ok(dir) = std::env::var("GRADER_INCLUDE_DIR") {
            includes.push(PathBuf::from(dir));
        }
        for include in includes {
            if !include.is_dir() {
                continue;
            }
            let include = include.display().to_string();
            if self.gpu {
                compiler = compiler.add_flags(["-I", include.as_str()]);
            } else {
                compiler = compiler.add_flags(["-iquote", include.as_str()]);
            }
        }
        if self.openmp {
            compiler = compiler.add_omp_flags();
        }
        compiler
    }

    /// Probe for a default compiler: the device compiler on GPU exercises,
    /// otherwise native compilers in fixed priority order.
    pub fn find_compiler(&self) -> Option<Compiler> {
        if self.gpu {
            find_nvcc_compiler()
        } else {
            find_gcc_compiler().or_else(find_clang_compiler)
        }
    }
}

/// One layered remote setting and the ways it can be provided.
#[derive(Debug, Clone)]
pub struct Property {
    name: &'static str,
    human_name: &'static str,
    env: Option<&'static str>,
    help: Option<&'static str>,
    value: Option<String>,
    file_locations: Vec<PathBuf>,
}

impl Property {
    pub fn get_optional(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn get_required(&self) -> Result<&str, GraderError> {
        self.value
            .as_deref()
            .ok_or_else(|| GraderError::Config(self.explain("not configured")))
    }

    /// Operator-facing text describing every way to provide the value.
    pub fn explain(&self, status: &str) -> String {
        let mut methods = Vec::new();
        if let Some(env) = self.env {
            methods.push(format!(" · Set the environment variable {env}."));
        }
        for location in &self.file_locations {
            methods.push(format!(
                " · Add to {}:\n\n   [remote]\n   {} = \"place the value here\"\n",
                location.display(),
                self.name
            ));
        }
        let help = self
            .help
            .map(|h| format!("\n{h}\n"))
            .unwrap_or_default();
        format!(
            "{} {status}.\n{help}\nThe value can be provided in the following ways:\n{}",
            self.human_name,
            methods.join("\n")
        )
    }
}

/// Remote-service settings collected from all sources.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub api_token: Property,
    pub remote_grader: Property,
    pub remote_max_timeout: Property,
    /// Transport argv for reaching the service, whitespace-separated.
    pub endpoint: Property,
}

impl RemoteConfig {
    /// Collect settings for the exercise at `base_dir`.
    pub fn collect(base_dir: &Path, exercise_remote: &BTreeMap<String, String>) -> Self {
        let home_path = home_config_path();
        let mut layered = load_remote_table(&home_path);
        for (k, v) in exercise_remote {
            layered.insert(k.clone(), v.clone());
        }

        let exercise_path = base_dir.join(EXERCISE_CONFIG);
        let locations = vec![home_path, exercise_path];

        let property = |name: &'static str,
                        human_name: &'static str,
                        env: Option<&'static str>,
                        help: Option<&'static str>| {
            let mut value = layered.get(name).cloned();
            if let Some(env_name) = env {
                if let Ok(env_value) = std::env::var(env_name) {
                    value = Some(env_value);
                }
            }
            Property {
                name,
                human_name,
                env,
                help,
                value,
                file_locations: locations.clone(),
            }
        };

        RemoteConfig {
            api_token: property(
                "api_token",
                "API token",
                Some("GRADER_API_TOKEN"),
                Some("Visit the course page to obtain an API token for your account."),
            ),
            remote_grader: property("remote_grader", "remote grader name", None, None),
            remote_max_timeout: property("remote_max_timeout", "remote timeout limit", None, None),
            endpoint: property(
                "endpoint",
                "service endpoint command",
                Some("GRADER_ENDPOINT"),
                None,
            ),
        }
    }

    /// Load only from the exercise's raw table (used by `collect_all`).
    pub fn for_exercise(base_dir: &Path) -> Result<Self, GraderError> {
        let path = base_dir.join(EXERCISE_CONFIG);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| GraderError::Config(format!("Could not read {}: {e}", path.display())))?;
        let raw: RawExercise = toml::from_str(&text).map_err(|e| {
            GraderError::Config(format!(
                "Error while reading configuration file {}:\n{e}",
                path.display()
            ))
        })?;
        Ok(Self::collect(base_dir, &raw.remote))
    }

    /// Endpoint argv, split on whitespace.
    pub fn endpoint_argv(&self) -> Result<Vec<String>, GraderError> {
        let raw = self.endpoint.get_required()?;
        let argv: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
        if argv.is_empty() {
            return Err(GraderError::Config(
                self.endpoint.explain("is empty"),
            ));
        }
        Ok(argv)
    }
}

fn home_config_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("grader/config.toml");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config/grader/config.toml")
}

fn load_remote_table(path: &Path) -> BTreeMap<String, String> {
    #[derive(Deserialize)]
    struct HomeConfig {
        #[serde(default)]
        remote: BTreeMap<String, String>,
    }
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| toml::from_str::<HomeConfig>(&text).ok())
        .map(|cfg| cfg.remote)
        .unwrap_or_default()
}
