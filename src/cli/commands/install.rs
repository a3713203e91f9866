//! Install command implementation

use std::process::ExitCode;

use crate::cli::logging::{log, LogLevel};
use crate::cli::InstallArgs;
use crate::error::ResolveResult;
use crate::installer::install_command;
use crate::probe::python::PythonRuntime;
use crate::probe::SystemProbe;
use crate::release::{resolve_release_tag, ReleaseIndex, TagSource, DEFAULT_RELEASE_TAG};
use crate::runtime::gather_fingerprint;
use crate::wheel::wheel_url;

/// Outcome of a resolved install run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The installer subprocess ran; its exit code passes through verbatim
    Installed { code: i32 },
    /// `--print-url` short-circuit after successful verification
    UrlPrinted,
    /// No published wheel matches this runtime
    NoMatchingWheel,
}

impl InstallOutcome {
    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            InstallOutcome::Installed { code } => ExitCode::from((*code).clamp(0, 255) as u8),
            InstallOutcome::UrlPrinted => ExitCode::SUCCESS,
            InstallOutcome::NoMatchingWheel => ExitCode::from(2),
        }
    }
}

/// Run the install pipeline: fingerprint, resolve tag, build URL, verify,
/// install.
///
/// Returns `Err` only for unrecoverable environment errors; diagnosed
/// negative outcomes ("no matching wheel") are `Ok` values with their own
/// exit codes.
pub fn run_install(
    args: &InstallArgs,
    level: LogLevel,
    probe: &dyn SystemProbe,
    python: &dyn PythonRuntime,
    index: &dyn ReleaseIndex,
) -> ResolveResult<InstallOutcome> {
    let fingerprint = gather_fingerprint(probe, python)?;
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "fingerprint: torch={} cuda={} abi={} platform={}",
            fingerprint.torch_major_minor,
            fingerprint.torch_cuda,
            fingerprint.cxx11abi,
            fingerprint.platform_tag
        ),
    );

    let resolved = resolve_release_tag(args.release_tag.as_deref(), index);
    match &resolved.source {
        TagSource::Explicit => {}
        TagSource::Latest => {
            log(level, LogLevel::Normal, &format!("Using latest release tag: {}", resolved.tag));
        }
        TagSource::Fallback { reason } => {
            log(
                level,
                LogLevel::Normal,
                &format!(
                    "Could not resolve latest release tag ({reason}). \
                     Falling back to {DEFAULT_RELEASE_TAG}."
                ),
            );
        }
    }

    let url = wheel_url(&resolved.tag, &fingerprint);
    log(
        level,
        LogLevel::Normal,
        &format!(
            "torch={} cuda={} python={}",
            fingerprint.torch_version, fingerprint.torch_cuda, fingerprint.python_tag
        ),
    );
    log(level, LogLevel::Normal, &format!("Resolved wheel: {url}"));

    if !index.wheel_exists(&url)? {
        log(level, LogLevel::Normal, "No matching prebuilt wheel found for this runtime.");
        log(
            level,
            LogLevel::Normal,
            "Try a different --release-tag, or align python/torch to a runtime \
             with published flash-attn wheels.",
        );
        return Ok(InstallOutcome::NoMatchingWheel);
    }

    if args.print_url {
        return Ok(InstallOutcome::UrlPrinted);
    }

    let command = install_command(args.installer, python.executable(), &url, probe);
    log(level, LogLevel::Normal, &format!("Installing via: {}", command.join(" ")));

    let argv: Vec<&str> = command[1..].iter().map(String::as_str).collect();
    let code = probe.run_status(&command[0], &argv)?;
    // A signal-killed installer carries no exit code; report plain failure.
    Ok(InstallOutcome::Installed { code: code.unwrap_or(1) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::installer::InstallerBackend;
    use crate::probe::python::{MockPython, TorchBuildInfo};
    use crate::probe::MockProbe;
    use crate::release::MockIndex;

    fn args() -> InstallArgs {
        InstallArgs { release_tag: None, print_url: false, installer: InstallerBackend::Auto }
    }

    fn cuda_python() -> MockPython {
        MockPython::new().with_torch(TorchBuildInfo::mock())
    }

    #[test]
    fn test_install_runs_uv_when_available() {
        let probe = MockProbe::new().with_path_program("uv");
        let python = cuda_python();
        let index = MockIndex::with_latest("v2.8.3");

        let outcome = run_install(&args(), LogLevel::Quiet, &probe, &python, &index).unwrap();
        assert_eq!(outcome, InstallOutcome::Installed { code: 0 });

        let invocations = probe.run_invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0][0], "uv");
        assert!(invocations[0].last().unwrap().ends_with(".whl"));
    }

    #[test]
    fn test_install_propagates_installer_exit_code() {
        let probe = MockProbe::new().with_run_exit(Some(7));
        let python = cuda_python();
        let index = MockIndex::with_latest("v2.8.3");

        let outcome = run_install(&args(), LogLevel::Quiet, &probe, &python, &index).unwrap();
        assert_eq!(outcome, InstallOutcome::Installed { code: 7 });
    }

    #[test]
    fn test_signal_killed_installer_maps_to_failure() {
        let probe = MockProbe::new().with_run_exit(None);
        let python = cuda_python();
        let index = MockIndex::with_latest("v2.8.3");

        let outcome = run_install(&args(), LogLevel::Quiet, &probe, &python, &index).unwrap();
        assert_eq!(outcome, InstallOutcome::Installed { code: 1 });
    }

    #[test]
    fn test_missing_wheel_exits_2_without_install() {
        let probe = MockProbe::new();
        let python = cuda_python();
        let index = MockIndex::with_latest("v2.8.3").with_wheel_found(false);

        let outcome = run_install(&args(), LogLevel::Quiet, &probe, &python, &index).unwrap();
        assert_eq!(outcome, InstallOutcome::NoMatchingWheel);
        assert!(probe.run_invocations().is_empty(), "no installer may run for a missing wheel");
    }

    #[test]
    fn test_print_url_short_circuits_before_install() {
        let probe = MockProbe::new().with_path_program("uv");
        let python = cuda_python();
        let index = MockIndex::with_latest("v2.8.3");
        let print_args = InstallArgs { print_url: true, ..args() };

        let outcome =
            run_install(&print_args, LogLevel::Quiet, &probe, &python, &index).unwrap();
        assert_eq!(outcome, InstallOutcome::UrlPrinted);
        assert!(probe.run_invocations().is_empty());
    }

    #[test]
    fn test_explicit_tag_skips_index_lookup() {
        let probe = MockProbe::new();
        let python = cuda_python();
        let index = MockIndex::with_latest("v9.9.9");
        let tagged = InstallArgs { release_tag: Some("v2.6.1".to_string()), ..args() };

        run_install(&tagged, LogLevel::Quiet, &probe, &python, &index).unwrap();
        let requests = index.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("head "));
        assert!(requests[0].contains("/v2.6.1/"));
    }

    #[test]
    fn test_index_failure_falls_back_to_default_tag() {
        let probe = MockProbe::new();
        let python = cuda_python();
        let index = MockIndex::failing("dns failure");

        run_install(&args(), LogLevel::Quiet, &probe, &python, &index).unwrap();
        let head = index.requests().into_iter().find(|r| r.starts_with("head ")).unwrap();
        assert!(head.contains(&format!("/{DEFAULT_RELEASE_TAG}/")));
    }

    #[test]
    fn test_unsupported_cuda_fails_before_any_request() {
        let probe = MockProbe::new();
        let torch = TorchBuildInfo { cuda: Some("11.8".to_string()), ..TorchBuildInfo::mock() };
        let python = MockPython::new().with_torch(torch);
        let index = MockIndex::with_latest("v2.8.3");

        let err = run_install(&args(), LogLevel::Quiet, &probe, &python, &index).unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedCuda { .. }));
        assert!(index.requests().is_empty(), "no network before fingerprint validation");
        assert!(probe.run_invocations().is_empty());
    }

    #[test]
    fn test_unsupported_platform_fails_before_any_request() {
        let probe = MockProbe::new().with_os("macos");
        let python = cuda_python();
        let index = MockIndex::with_latest("v2.8.3");

        let err = run_install(&args(), LogLevel::Quiet, &probe, &python, &index).unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedOs { .. }));
        assert!(index.requests().is_empty());
    }

    #[test]
    fn test_head_transport_error_is_unrecoverable() {
        // A transport failure is distinct from "artifact does not exist".
        let probe = MockProbe::new();
        let python = cuda_python();
        let index = MockIndex::with_latest("v2.8.3").with_head_error("bad gateway");

        let err = run_install(&args(), LogLevel::Quiet, &probe, &python, &index).unwrap_err();
        assert!(matches!(err, ResolveError::Fetch(_)));
        assert!(probe.run_invocations().is_empty());
    }

    #[test]
    fn test_resolved_url_matches_published_naming() {
        let probe = MockProbe::new();
        let python = cuda_python();
        let index = MockIndex::with_latest("v2.8.3");
        let tagged = InstallArgs { release_tag: Some("v2.8.3".to_string()), ..args() };

        run_install(&tagged, LogLevel::Quiet, &probe, &python, &index).unwrap();
        assert_eq!(
            index.requests(),
            vec![
                "head https://github.com/Dao-AILab/flash-attention/releases/download/v2.8.3/\
                 flash_attn-2.8.3%2Bcu12.1torch2.4cxx11abiTRUE-cp310-cp310-linux_x86_64.whl"
            ]
        );
    }
}
