//! Diagnose command implementation

use crate::cli::logging::{log, LogLevel};
use crate::cli::{DiagnoseArgs, ReportFormat};
use crate::probe::python::{ImportOutcome, PythonRuntime};
use crate::probe::{first_line, last_line, probe_or_unavailable, SystemProbe};

/// Outcome of a compatibility diagnosis.
///
/// The variants form the exit-code taxonomy: 0 compatible, 1 torch
/// unusable, 2 flash-attn absent, 3 extension present but unloadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    /// The compiled extension loads; the runtime looks ABI-compatible
    Compatible,
    /// torch (or the interpreter itself) is unusable, nothing to diagnose
    TorchUnusable { message: String },
    /// flash-attn is not importable at all
    FlashAttnMissing { message: String },
    /// flash-attn imports but its compiled extension does not load
    ExtensionIncompatible { message: String, abi_mismatch: bool },
}

impl Diagnosis {
    /// Process exit code for this diagnosis.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Diagnosis::Compatible => 0,
            Diagnosis::TorchUnusable { .. } => 1,
            Diagnosis::FlashAttnMissing { .. } => 2,
            Diagnosis::ExtensionIncompatible { .. } => 3,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Diagnosis::Compatible => "compatible",
            Diagnosis::TorchUnusable { .. } => "torch-unusable",
            Diagnosis::FlashAttnMissing { .. } => "flash-attn-missing",
            Diagnosis::ExtensionIncompatible { .. } => "extension-incompatible",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            Diagnosis::Compatible => None,
            Diagnosis::TorchUnusable { message }
            | Diagnosis::FlashAttnMissing { message }
            | Diagnosis::ExtensionIncompatible { message, .. } => Some(message.as_str()),
        }
    }
}

/// Run the diagnose pipeline and report the outcome.
pub fn run_diagnose(
    args: &DiagnoseArgs,
    level: LogLevel,
    probe: &dyn SystemProbe,
    python: &dyn PythonRuntime,
) -> Diagnosis {
    let diagnosis = probe_runtime(level, probe, python);

    if args.format == ReportFormat::Json {
        let report = serde_json::json!({
            "diagnosis": diagnosis.label(),
            "exit_code": diagnosis.exit_code(),
            "detail": diagnosis.detail(),
            "abi_mismatch": matches!(
                &diagnosis,
                Diagnosis::ExtensionIncompatible { abi_mismatch: true, .. }
            ),
        });
        if let Ok(json_str) = serde_json::to_string_pretty(&report) {
            println!("{json_str}");
        }
    }

    diagnosis
}

fn probe_runtime(
    level: LogLevel,
    probe: &dyn SystemProbe,
    python: &dyn PythonRuntime,
) -> Diagnosis {
    log(level, LogLevel::Verbose, &format!("probing interpreter: {}", python.executable()));

    match python.describe() {
        Ok(info) => {
            log(level, LogLevel::Normal, &format!("python: {}", info.version));
            log(level, LogLevel::Normal, &format!("executable: {}", info.executable));
            log(level, LogLevel::Normal, &format!("platform: {}", info.platform));
        }
        Err(err) => {
            log(level, LogLevel::Normal, &format!("python probe failed: {err}"));
            return Diagnosis::TorchUnusable { message: err.to_string() };
        }
    }

    let cuda_home = probe.env_var("CUDA_HOME").unwrap_or_else(|| "<unset>".to_string());
    log(level, LogLevel::Normal, &format!("CUDA_HOME: {cuda_home}"));

    let nvcc_output = probe_or_unavailable(probe, "nvcc", &["--version"]);
    let nvcc = last_line(&nvcc_output).unwrap_or(nvcc_output);
    log(level, LogLevel::Normal, &format!("nvcc: {nvcc}"));

    let smi_output = probe_or_unavailable(
        probe,
        "nvidia-smi",
        &["--query-gpu=driver_version", "--format=csv,noheader"],
    );
    let driver = first_line(&smi_output).unwrap_or(smi_output);
    log(level, LogLevel::Normal, &format!("nvidia-smi: {driver}"));

    let torch = match python.torch_build_info() {
        Ok(torch) => torch,
        Err(err) => {
            log(level, LogLevel::Normal, &format!("torch import failed: {err}"));
            return Diagnosis::TorchUnusable { message: err.to_string() };
        }
    };
    let torch_cuda = torch.cuda.as_deref().unwrap_or("<none>").to_string();
    log(level, LogLevel::Normal, &format!("torch: {}", torch.version));
    log(level, LogLevel::Normal, &format!("torch.version.cuda: {torch_cuda}"));
    log(level, LogLevel::Normal, &format!("torch.cuda.is_available: {}", torch.cuda_available));

    if let ImportOutcome::Failed { message } = python.try_import("flash_attn") {
        log(level, LogLevel::Normal, &format!("flash_attn import failed: {message}"));
        log(
            level,
            LogLevel::Normal,
            "Diagnosis: flash-attn is missing or not loadable in this environment.",
        );
        return Diagnosis::FlashAttnMissing { message };
    }

    let flash_version =
        python.module_version("flash_attn").unwrap_or_else(|| "<unknown>".to_string());
    log(level, LogLevel::Normal, &format!("flash_attn: {flash_version}"));

    // The pure package can import while its compiled extension is stale,
    // so the extension gets its own load attempt.
    if let ImportOutcome::Failed { message } = python.try_import("flash_attn_2_cuda") {
        log(level, LogLevel::Normal, &format!("flash_attn_2_cuda import failed: {message}"));
        let abi_mismatch = message.contains("undefined symbol");
        if abi_mismatch {
            log(
                level,
                LogLevel::Normal,
                &format!(
                    "Diagnosis: ABI mismatch. flash-attn was built against a different \
                     PyTorch/CUDA runtime than the current one (torch={}, cuda={torch_cuda}).",
                    torch.version
                ),
            );
            log(
                level,
                LogLevel::Normal,
                "Fix: reinstall flash-attn in this exact environment after torch is finalized.",
            );
            log(level, LogLevel::Normal, "Command: flash-doctor install");
        }
        return Diagnosis::ExtensionIncompatible { message, abi_mismatch };
    }

    log(level, LogLevel::Normal, "flash_attn_2_cuda import succeeded.");
    log(level, LogLevel::Normal, "flash-attn looks ABI-compatible with this runtime.");
    Diagnosis::Compatible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::python::{MockPython, TorchBuildInfo};
    use crate::probe::MockProbe;

    fn args() -> DiagnoseArgs {
        DiagnoseArgs { format: ReportFormat::Text }
    }

    #[test]
    fn test_missing_torch_exits_1_without_further_probes() {
        let probe = MockProbe::new();
        let python = MockPython::new();

        let diagnosis = run_diagnose(&args(), LogLevel::Quiet, &probe, &python);
        assert_eq!(diagnosis.exit_code(), 1);
        assert!(matches!(diagnosis, Diagnosis::TorchUnusable { .. }));
        assert!(
            python.imports_attempted().is_empty(),
            "flash-attn must not be probed when torch is unusable"
        );
    }

    #[test]
    fn test_missing_flash_attn_exits_2() {
        let probe = MockProbe::new();
        let python = MockPython::new().with_torch(TorchBuildInfo::mock());

        let diagnosis = run_diagnose(&args(), LogLevel::Quiet, &probe, &python);
        assert_eq!(diagnosis.exit_code(), 2);
        assert!(matches!(diagnosis, Diagnosis::FlashAttnMissing { .. }));
        assert_eq!(python.imports_attempted(), vec!["flash_attn"]);
    }

    #[test]
    fn test_undefined_symbol_is_diagnosed_as_abi_mismatch() {
        let probe = MockProbe::new();
        let python = MockPython::new()
            .with_torch(TorchBuildInfo::mock())
            .with_import_ok("flash_attn")
            .with_module_version("flash_attn", "2.8.3")
            .with_import_error(
                "flash_attn_2_cuda",
                "ImportError: flash_attn_2_cuda.cpython-310-x86_64-linux-gnu.so: \
                 undefined symbol: _ZN3c106detail14torchCheckFailE",
            );

        let diagnosis = run_diagnose(&args(), LogLevel::Quiet, &probe, &python);
        assert_eq!(diagnosis.exit_code(), 3);
        match diagnosis {
            Diagnosis::ExtensionIncompatible { abi_mismatch, message } => {
                assert!(abi_mismatch);
                assert!(message.contains("undefined symbol"));
            }
            other => panic!("expected ExtensionIncompatible, got {other:?}"),
        }
    }

    #[test]
    fn test_other_extension_failure_still_exits_3() {
        let probe = MockProbe::new();
        let python = MockPython::new()
            .with_torch(TorchBuildInfo::mock())
            .with_import_ok("flash_attn")
            .with_import_error("flash_attn_2_cuda", "OSError: libcudart.so.12: cannot open");

        let diagnosis = run_diagnose(&args(), LogLevel::Quiet, &probe, &python);
        assert_eq!(diagnosis.exit_code(), 3);
        assert!(matches!(
            diagnosis,
            Diagnosis::ExtensionIncompatible { abi_mismatch: false, .. }
        ));
    }

    #[test]
    fn test_compatible_runtime_exits_0() {
        let probe = MockProbe::new()
            .with_env("CUDA_HOME", "/usr/local/cuda")
            .with_command("nvcc", "Cuda compilation tools, release 12.1, V12.1.105")
            .with_command("nvidia-smi", "535.104.05");
        let python = MockPython::new()
            .with_torch(TorchBuildInfo::mock())
            .with_import_ok("flash_attn")
            .with_module_version("flash_attn", "2.8.3")
            .with_import_ok("flash_attn_2_cuda");

        let diagnosis = run_diagnose(&args(), LogLevel::Quiet, &probe, &python);
        assert_eq!(diagnosis, Diagnosis::Compatible);
        assert_eq!(diagnosis.exit_code(), 0);
        assert_eq!(python.imports_attempted(), vec!["flash_attn", "flash_attn_2_cuda"]);
    }

    #[test]
    fn test_unavailable_driver_probes_do_not_change_outcome() {
        // nvcc and nvidia-smi are informational; their absence must not
        // affect the exit code.
        let probe = MockProbe::new();
        let python = MockPython::new()
            .with_torch(TorchBuildInfo::mock())
            .with_import_ok("flash_attn")
            .with_import_ok("flash_attn_2_cuda");

        let diagnosis = run_diagnose(&args(), LogLevel::Quiet, &probe, &python);
        assert_eq!(diagnosis.exit_code(), 0);
    }

    #[test]
    fn test_json_format_reports_same_diagnosis() {
        let probe = MockProbe::new();
        let python = MockPython::new();
        let json_args = DiagnoseArgs { format: ReportFormat::Json };

        let diagnosis = run_diagnose(&json_args, LogLevel::Quiet, &probe, &python);
        assert_eq!(diagnosis.exit_code(), 1);
    }

    #[test]
    fn test_diagnosis_labels() {
        assert_eq!(Diagnosis::Compatible.label(), "compatible");
        assert_eq!(
            Diagnosis::ExtensionIncompatible { message: "m".into(), abi_mismatch: true }.label(),
            "extension-incompatible"
        );
    }
}
