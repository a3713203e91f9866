//! Python interpreter probing.
//!
//! The runtime under diagnosis lives inside a CPython process, so every
//! question about it (can torch import? which CUDA was it built with?) is
//! answered by running a short snippet in a real interpreter subprocess and
//! reading what it printed. [`SystemPython`] does exactly that;
//! [`MockPython`] answers from canned data for tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;
use crate::probe::{last_line, SystemProbe};

/// Identity of the probed interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterInfo {
    /// `sys.version` with newlines folded to spaces
    pub version: String,
    /// `sys.executable`
    pub executable: String,
    /// `sys.platform`
    pub platform: String,
}

/// Build metadata reported by an importable torch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorchBuildInfo {
    /// `torch.__version__`
    pub version: String,
    /// `torch.version.cuda`; `None` for CPU-only builds
    pub cuda: Option<String>,
    /// `torch.cuda.is_available()`
    pub cuda_available: bool,
    /// `torch._C._GLIBCXX_USE_CXX11_ABI`
    pub cxx11abi: bool,
    /// `sys.version_info.major` of the hosting interpreter
    pub python_major: u32,
    /// `sys.version_info.minor` of the hosting interpreter
    pub python_minor: u32,
}

impl TorchBuildInfo {
    /// Canned cu12.1 build on CPython 3.10, for tests.
    #[must_use]
    pub fn mock() -> Self {
        Self {
            version: "2.4.1+cu121".to_string(),
            cuda: Some("12.1".to_string()),
            cuda_available: true,
            cxx11abi: true,
            python_major: 3,
            python_minor: 10,
        }
    }
}

/// Result of attempting to import a module in the probed interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The import succeeded
    Ok,
    /// The import raised; `message` is the final traceback line
    Failed { message: String },
}

/// Provider interface over the Python runtime under diagnosis.
pub trait PythonRuntime {
    /// Path or name of the interpreter executable.
    fn executable(&self) -> &str;

    /// Interpreter version, executable path, and platform tag.
    fn describe(&self) -> Result<InterpreterInfo, ProbeError>;

    /// Attempt `import <module>`; never fails the process.
    fn try_import(&self, module: &str) -> ImportOutcome;

    /// `<module>.__version__`, or `None` when unavailable.
    fn module_version(&self, module: &str) -> Option<String>;

    /// Import torch and report its build metadata.
    fn torch_build_info(&self) -> Result<TorchBuildInfo, ProbeError>;
}

const DESCRIBE_SNIPPET: &str = r#"
import sys
print(sys.version.replace("\n", " "))
print(sys.executable)
print(sys.platform)
"#;

const TORCH_INFO_SNIPPET: &str = r#"
import json, sys
import torch
info = {
    "version": str(torch.__version__),
    "cuda": torch.version.cuda,
    "cuda_available": bool(torch.cuda.is_available()),
    "cxx11abi": bool(torch._C._GLIBCXX_USE_CXX11_ABI),
    "python_major": sys.version_info.major,
    "python_minor": sys.version_info.minor,
}
print(json.dumps(info))
"#;

/// [`PythonRuntime`] backed by a real interpreter subprocess.
#[derive(Debug, Clone)]
pub struct SystemPython {
    exe: String,
}

impl SystemPython {
    /// Resolve the interpreter to probe.
    ///
    /// Priority: `$PYTHON`, then `python3`, then `python` on PATH.
    pub fn resolve(probe: &dyn SystemProbe) -> Result<Self, ProbeError> {
        if let Some(exe) = probe.env_var("PYTHON") {
            if !exe.is_empty() {
                return Ok(Self { exe });
            }
        }
        for candidate in ["python3", "python"] {
            if probe.has_command(candidate) {
                return Ok(Self { exe: candidate.to_string() });
            }
        }
        Err(ProbeError::NoInterpreter)
    }

    /// Use an explicit interpreter executable.
    #[must_use]
    pub fn with_executable(exe: impl Into<String>) -> Self {
        Self { exe: exe.into() }
    }

    fn run_snippet(&self, snippet: &str) -> Result<std::process::Output, ProbeError> {
        Command::new(&self.exe).arg("-c").arg(snippet).output().map_err(|source| {
            ProbeError::Spawn { program: self.exe.clone(), source }
        })
    }
}

impl PythonRuntime for SystemPython {
    fn executable(&self) -> &str {
        &self.exe
    }

    fn describe(&self) -> Result<InterpreterInfo, ProbeError> {
        let output = self.run_snippet(DESCRIBE_SNIPPET)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::NonZeroExit {
                program: self.exe.clone(),
                status: output.status.to_string(),
                detail: last_line(&stderr).unwrap_or_else(|| output.status.to_string()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
        match (lines.next(), lines.next(), lines.next()) {
            (Some(version), Some(executable), Some(platform)) => Ok(InterpreterInfo {
                version: version.to_string(),
                executable: executable.to_string(),
                platform: platform.to_string(),
            }),
            _ => Err(ProbeError::InvalidOutput {
                program: self.exe.clone(),
                detail: "interpreter identity snippet printed fewer than 3 lines".to_string(),
            }),
        }
    }

    fn try_import(&self, module: &str) -> ImportOutcome {
        let output = match self.run_snippet(&format!("import {module}")) {
            Ok(output) => output,
            Err(err) => return ImportOutcome::Failed { message: err.to_string() },
        };
        if output.status.success() {
            return ImportOutcome::Ok;
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        ImportOutcome::Failed {
            message: last_line(&stderr).unwrap_or_else(|| output.status.to_string()),
        }
    }

    fn module_version(&self, module: &str) -> Option<String> {
        let snippet = format!("import {module}; print(getattr({module}, '__version__', ''))");
        let output = self.run_snippet(&snippet).ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        last_line(&stdout).filter(|v| !v.is_empty())
    }

    fn torch_build_info(&self) -> Result<TorchBuildInfo, ProbeError> {
        let output = self.run_snippet(TORCH_INFO_SNIPPET)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::NonZeroExit {
                program: self.exe.clone(),
                status: output.status.to_string(),
                detail: last_line(&stderr).unwrap_or_else(|| output.status.to_string()),
            });
        }

        // torch may emit warnings first; the JSON payload is the final line.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let payload = last_line(&stdout).ok_or_else(|| ProbeError::InvalidOutput {
            program: self.exe.clone(),
            detail: "torch build-info snippet printed nothing".to_string(),
        })?;
        serde_json::from_str(&payload).map_err(|err| ProbeError::InvalidOutput {
            program: self.exe.clone(),
            detail: format!("torch build-info payload was not valid JSON: {err}"),
        })
    }
}

/// Fake [`PythonRuntime`] for tests.
///
/// Unknown modules fail to import with a realistic `ModuleNotFoundError`
/// message; recorded import attempts can be inspected with
/// [`MockPython::imports_attempted`].
#[derive(Debug)]
pub struct MockPython {
    info: InterpreterInfo,
    torch: Result<TorchBuildInfo, String>,
    imports: HashMap<String, ImportOutcome>,
    versions: HashMap<String, String>,
    import_log: RefCell<Vec<String>>,
}

impl MockPython {
    pub fn new() -> Self {
        Self {
            info: InterpreterInfo {
                version: "3.10.12 (main, Jun 11 2024, 13:04:04) [GCC 11.4.0]".to_string(),
                executable: "/usr/bin/python3".to_string(),
                platform: "linux".to_string(),
            },
            torch: Err("ModuleNotFoundError: No module named 'torch'".to_string()),
            imports: HashMap::new(),
            versions: HashMap::new(),
            import_log: RefCell::new(Vec::new()),
        }
    }

    /// Make torch importable with the given build info.
    #[must_use]
    pub fn with_torch(mut self, torch: TorchBuildInfo) -> Self {
        self.torch = Ok(torch);
        self
    }

    /// Make the torch probe fail with `message`.
    #[must_use]
    pub fn with_torch_error(mut self, message: &str) -> Self {
        self.torch = Err(message.to_string());
        self
    }

    /// Make `module` importable.
    #[must_use]
    pub fn with_import_ok(mut self, module: &str) -> Self {
        self.imports.insert(module.to_string(), ImportOutcome::Ok);
        self
    }

    /// Make importing `module` fail with `message`.
    #[must_use]
    pub fn with_import_error(mut self, module: &str, message: &str) -> Self {
        self.imports.insert(
            module.to_string(),
            ImportOutcome::Failed { message: message.to_string() },
        );
        self
    }

    /// Set `module.__version__`.
    #[must_use]
    pub fn with_module_version(mut self, module: &str, version: &str) -> Self {
        self.versions.insert(module.to_string(), version.to_string());
        self
    }

    /// Override the interpreter identity.
    #[must_use]
    pub fn with_interpreter(mut self, info: InterpreterInfo) -> Self {
        self.info = info;
        self
    }

    /// Modules passed to `try_import` so far, in order.
    pub fn imports_attempted(&self) -> Vec<String> {
        self.import_log.borrow().clone()
    }
}

impl Default for MockPython {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonRuntime for MockPython {
    fn executable(&self) -> &str {
        &self.info.executable
    }

    fn describe(&self) -> Result<InterpreterInfo, ProbeError> {
        Ok(self.info.clone())
    }

    fn try_import(&self, module: &str) -> ImportOutcome {
        self.import_log.borrow_mut().push(module.to_string());
        self.imports.get(module).cloned().unwrap_or_else(|| ImportOutcome::Failed {
            message: format!("ModuleNotFoundError: No module named '{module}'"),
        })
    }

    fn module_version(&self, module: &str) -> Option<String> {
        self.versions.get(module).cloned()
    }

    fn torch_build_info(&self) -> Result<TorchBuildInfo, ProbeError> {
        self.torch.clone().map_err(|detail| ProbeError::NonZeroExit {
            program: self.info.executable.clone(),
            status: "exit status: 1".to_string(),
            detail,
        })
    }
}
