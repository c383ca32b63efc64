//! Compiler invocation wrapper.
//!
//! A [`Compiler`] is an immutable builder: adding a flag or a source file
//! yields a new value, so command variants can derive from a shared base
//! without clobbering it. Version introspection happens once at probe time
//! and is used for capability gating (e.g. pattern-initialization of stack
//! variables needs gcc >= 12 or clang >= 8).

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use regex_lite::Regex;

pub use grader_protocol::CompilerFamily;

use crate::session::Session;

/// A prepared compiler invocation: identity plus accumulated flags/sources.
#[derive(Debug, Clone)]
pub struct Compiler {
    family: CompilerFamily,
    program: String,
    version: Vec<u32>,
    flags: Vec<String>,
    sources: Vec<PathBuf>,
}

/// Outcome of one compile. Captured output is preserved even on failure so
/// diagnostics are never swallowed.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub binary: PathBuf,
}

impl CompilationResult {
    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl Compiler {
    /// Probe `program` and build a compiler handle if it looks like a valid
    /// member of `family`. Returns `None` when the program is missing,
    /// not executable, or of the wrong family.
    pub fn probe(family: CompilerFamily, program: &str) -> Option<Self> {
        let output = Command::new(program).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        if !family_matches(family, &text) {
            return None;
        }
        Some(Self {
            family,
            program: program.to_string(),
            version: parse_version(family, &text),
            flags: Vec::new(),
            sources: Vec::new(),
        })
    }

    /// Construct without probing. Used in tests and for version data that
    /// was already validated.
    pub fn unchecked(family: CompilerFamily, program: &str, version: Vec<u32>) -> Self {
        Self {
            family,
            program: program.to_string(),
            version,
            flags: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn family(&self) -> CompilerFamily {
        self.family
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Probed version tuple; empty when the version line was unparseable.
    pub fn version(&self) -> &[u32] {
        &self.version
    }

    pub fn major(&self) -> u32 {
        self.version.first().copied().unwrap_or(0)
    }

    pub fn add_flag(mut self, flag: &str) -> Self {
        self.flags.push(flag.to_string());
        self
    }

    pub fn add_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// OpenMP flags for this family. nvcc forwards them to the host
    /// compiler.
    pub fn add_omp_flags(self) -> Self {
        match self.family {
            CompilerFamily::Gcc | CompilerFamily::Clang => self.add_flag("-fopenmp"),
            CompilerFamily::Nvcc => self.add_flags(["-Xcompiler", "-fopenmp"]),
        }
    }

    pub fn add_source(mut self, source: &Path) -> Self {
        self.sources.push(source.to_path_buf());
        self
    }

    /// The argv this invocation would run for `out_file`.
    pub fn command_line(&self, out_file: &Path) -> Vec<String> {
        let mut argv = vec![self.program.clone()];
        argv.extend(self.flags.iter().cloned());
        argv.extend(self.sources.iter().map(|s| s.display().to_string()));
        argv.push("-o".to_string());
        argv.push(out_file.display().to_string());
        argv
    }

    /// Run the compile, producing `out_file` on success.
    pub fn compile(&self, session: &Session, out_file: &Path) -> io::Result<CompilationResult> {
        let argv = self.command_line(out_file);
        session.log_command(&argv, 1);

        let output = Command::new(&argv[0]).args(&argv[1..]).output()?;
        Ok(CompilationResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            binary: out_file.to_path_buf(),
        })
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)
    }
}

fn family_matches(family: CompilerFamily, version_text: &str) -> bool {
    match family {
        // clang also claims gcc compatibility, so rule it out explicitly.
        CompilerFamily::Gcc => !version_text.contains("clang") && version_text.contains("g++"),
        CompilerFamily::Clang => version_text.contains("clang"),
        CompilerFamily::Nvcc => version_text.contains("Cuda compilation tools"),
    }
}

fn parse_version(family: CompilerFamily, version_text: &str) -> Vec<u32> {
    let pattern = match family {
        CompilerFamily::Nvcc => r"release (\d+)\.(\d+)",
        _ => r"(\d+)\.(\d+)\.(\d+)",
    };
    let re = Regex::new(pattern).expect("static pattern");
    let Some(caps) = re.captures(version_text) else {
        return Vec::new();
    };
    (1..caps.len())
        .filter_map(|i| caps.get(i))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// First usable gcc, trying the bare name before versioned installs.
pub fn find_gcc_compiler() -> Option<Compiler> {
    const CANDIDATES: &[&str] = &[
        "g++", "g++-14", "g++-13", "g++-12", "g++-11", "g++-10", "g++-9",
    ];
    CANDIDATES
        .iter()
        .find_map(|name| Compiler::probe(CompilerFamily::Gcc, name))
}

/// First usable clang.
pub fn find_clang_compiler() -> Option<Compiler> {
    const CANDIDATES: &[&str] = &[
        "clang++",
        "clang++-19",
        "clang++-18",
        "clang++-17",
        "clang++-16",
        "clang++-15",
        "clang++-14",
    ];
    CANDIDATES
        .iter()
        .find_map(|name| Compiler::probe(CompilerFamily::Clang, name))
}

/// The device compiler, if installed.
pub fn find_nvcc_compiler() -> Option<Compiler> {
    Compiler::probe(CompilerFamily::Nvcc, "nvcc")
}

/// Resolve a family plus optional explicit binary name, as carried in the
/// remote envelope or given with `--gcc NAME` style flags.
pub fn resolve_selection(
    family: CompilerFamily,
    name: &str,
) -> Result<Compiler, crate::error::GraderError> {
    let found = if name.is_empty() {
        match family {
            CompilerFamily::Gcc => find_gcc_compiler(),
            CompilerFamily::Clang => find_clang_compiler(),
            CompilerFamily::Nvcc => find_nvcc_compiler(),
        }
    } else {
        Compiler::probe(family, name)
    };
    found.ok_or_else(|| {
        crate::error::GraderError::Config(if name.is_empty() {
            format!("Couldn't automatically find {family} compiler")
        } else {
            format!("Program {name} is not a supported {family} compiler")
        })
    })
}
