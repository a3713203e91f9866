//! CLI command implementations

pub mod diagnose;
pub mod install;

pub use diagnose::{run_diagnose, Diagnosis};
pub use install::{run_install, InstallOutcome};

use std::process::ExitCode;

use crate::cli::logging::LogLevel;
use crate::cli::{DiagnoseArgs, InstallArgs};
use crate::probe::python::SystemPython;
use crate::probe::HostProbe;
use crate::release::GitHubReleases;

/// Run `diagnose` against the host environment.
pub fn run_diagnose_host(args: &DiagnoseArgs, level: LogLevel) -> ExitCode {
    let probe = HostProbe::new();
    let python = match SystemPython::resolve(&probe) {
        Ok(python) => python,
        Err(err) => {
            eprintln!("Error: {err}");
            // Without an interpreter the runtime is undiagnosable.
            return ExitCode::from(1);
        }
    };
    ExitCode::from(run_diagnose(args, level, &probe, &python).exit_code())
}

/// Run `install` against the host environment.
pub fn run_install_host(args: &InstallArgs, level: LogLevel) -> ExitCode {
    let probe = HostProbe::new();
    let python = match SystemPython::resolve(&probe) {
        Ok(python) => python,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let index = match GitHubReleases::new() {
        Ok(index) => index,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run_install(args, level, &probe, &python, &index) {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
