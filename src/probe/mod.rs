//! Ambient environment probes.
//!
//! Process-global state (environment variables, PATH, OS identity, external
//! commands) sits behind [`SystemProbe`] so the diagnose and install
//! pipelines can run against a fake environment in tests. [`HostProbe`] is
//! the real implementation; [`MockProbe`] is the fake.

pub mod python;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::process::Command;

use crate::error::ProbeError;

/// Read-only provider for process-global state plus subprocess execution.
pub trait SystemProbe {
    /// Read an environment variable; `None` when unset.
    fn env_var(&self, name: &str) -> Option<String>;

    /// Whether `program` resolves to an executable on PATH.
    fn has_command(&self, program: &str) -> bool;

    /// Run `program` with `args`, capturing its output as text.
    fn command_output(&self, program: &str, args: &[&str]) -> Result<String, ProbeError>;

    /// Run `program` with `args` with inherited stdio; returns the exit code,
    /// or `None` when the child was killed by a signal.
    fn run_status(&self, program: &str, args: &[&str]) -> Result<Option<i32>, ProbeError>;

    /// Host operating system (`std::env::consts::OS`).
    fn os(&self) -> String;

    /// Host CPU architecture (`std::env::consts::ARCH`).
    fn arch(&self) -> String;
}

/// Run an informational probe, rendering any failure as an inline
/// `<unavailable: ...>` placeholder instead of propagating it.
pub fn probe_or_unavailable(probe: &dyn SystemProbe, program: &str, args: &[&str]) -> String {
    match probe.command_output(program, args) {
        Ok(output) => output,
        Err(err) => format!("<unavailable: {}: {err}>", err.kind()),
    }
}

/// [`SystemProbe`] backed by the real host environment.
#[derive(Debug, Default)]
pub struct HostProbe;

impl HostProbe {
    pub fn new() -> Self {
        Self
    }
}

impl SystemProbe for HostProbe {
    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn has_command(&self, program: &str) -> bool {
        let Some(path) = std::env::var_os("PATH") else {
            return false;
        };
        std::env::split_paths(&path).any(|dir| is_executable(&dir.join(program)))
    }

    fn command_output(&self, program: &str, args: &[&str]) -> Result<String, ProbeError> {
        let output = Command::new(program).args(args).output().map_err(|source| {
            ProbeError::Spawn { program: program.to_string(), source }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(ProbeError::NonZeroExit {
                program: program.to_string(),
                status: output.status.to_string(),
                detail: last_line(&stderr).unwrap_or_else(|| output.status.to_string()),
            });
        }

        // Probed tools write version text to either stream.
        let mut text = stdout.trim().to_string();
        if text.is_empty() {
            text = stderr.trim().to_string();
        }
        Ok(text)
    }

    fn run_status(&self, program: &str, args: &[&str]) -> Result<Option<i32>, ProbeError> {
        let status = Command::new(program).args(args).status().map_err(|source| {
            ProbeError::Spawn { program: program.to_string(), source }
        })?;
        Ok(status.code())
    }

    fn os(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn arch(&self) -> String {
        std::env::consts::ARCH.to_string()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata().map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Last non-empty line of a block of output.
pub fn last_line(text: &str) -> Option<String> {
    text.lines().rev().find(|line| !line.trim().is_empty()).map(|line| line.trim().to_string())
}

/// First non-empty line of a block of output.
pub fn first_line(text: &str) -> Option<String> {
    text.lines().find(|line| !line.trim().is_empty()).map(|line| line.trim().to_string())
}

/// Fake [`SystemProbe`] for tests.
///
/// Starts as an empty Linux/x86_64 environment; populate it with the
/// builder methods. Recorded `run_status` invocations can be inspected with
/// [`MockProbe::run_invocations`] to assert that no subprocess was launched.
#[derive(Debug)]
pub struct MockProbe {
    env: HashMap<String, String>,
    outputs: HashMap<String, Result<String, String>>,
    path_programs: HashSet<String>,
    os: String,
    arch: String,
    run_exit: Option<i32>,
    run_log: RefCell<Vec<Vec<String>>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self {
            env: HashMap::new(),
            outputs: HashMap::new(),
            path_programs: HashSet::new(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            run_exit: Some(0),
            run_log: RefCell::new(Vec::new()),
        }
    }

    /// Set an environment variable.
    #[must_use]
    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.env.insert(name.to_string(), value.to_string());
        self
    }

    /// Make `program` succeed with `output` when probed.
    #[must_use]
    pub fn with_command(mut self, program: &str, output: &str) -> Self {
        self.outputs.insert(program.to_string(), Ok(output.to_string()));
        self
    }

    /// Make `program` run but exit non-zero with `detail`.
    #[must_use]
    pub fn with_failing_command(mut self, program: &str, detail: &str) -> Self {
        self.outputs.insert(program.to_string(), Err(detail.to_string()));
        self
    }

    /// Make `program` visible on the fake PATH.
    #[must_use]
    pub fn with_path_program(mut self, program: &str) -> Self {
        self.path_programs.insert(program.to_string());
        self
    }

    /// Override the reported operating system.
    #[must_use]
    pub fn with_os(mut self, os: &str) -> Self {
        self.os = os.to_string();
        self
    }

    /// Override the reported CPU architecture.
    #[must_use]
    pub fn with_arch(mut self, arch: &str) -> Self {
        self.arch = arch.to_string();
        self
    }

    /// Exit code returned by `run_status`.
    #[must_use]
    pub fn with_run_exit(mut self, code: Option<i32>) -> Self {
        self.run_exit = code;
        self
    }

    /// Every `run_status` invocation so far, as `[program, args...]`.
    pub fn run_invocations(&self) -> Vec<Vec<String>> {
        self.run_log.borrow().clone()
    }
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for MockProbe {
    fn env_var(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }

    fn has_command(&self, program: &str) -> bool {
        self.path_programs.contains(program)
    }

    fn command_output(&self, program: &str, _args: &[&str]) -> Result<String, ProbeError> {
        match self.outputs.get(program) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(detail)) => Err(ProbeError::NonZeroExit {
                program: program.to_string(),
                status: "exit status: 1".to_string(),
                detail: detail.clone(),
            }),
            None => Err(ProbeError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such command"),
            }),
        }
    }

    fn run_status(&self, program: &str, args: &[&str]) -> Result<Option<i32>, ProbeError> {
        let mut invocation = vec![program.to_string()];
        invocation.extend(args.iter().map(|a| (*a).to_string()));
        self.run_log.borrow_mut().push(invocation);
        Ok(self.run_exit)
    }

    fn os(&self) -> String {
        self.os.clone()
    }

    fn arch(&self) -> String {
        self.arch.clone()
    }
}
