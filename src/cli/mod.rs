//! Command-line interface for flash-doctor.
//!
//! # Usage
//!
//! ```bash
//! # Check flash-attn ABI compatibility against the active runtime
//! flash-doctor diagnose
//!
//! # Resolve and install a matching prebuilt wheel
//! flash-doctor install
//!
//! # Resolve only; print the wheel URL and exit
//! flash-doctor install --print-url
//!
//! # Pin a release and force a backend
//! flash-doctor install --release-tag v2.8.3 --installer uv
//! ```

pub mod commands;
pub mod logging;

use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};

use crate::installer::InstallerBackend;
pub use logging::{log, LogLevel};

/// flash-doctor: flash-attn runtime compatibility doctor
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "flash-doctor")]
#[command(version)]
#[command(about = "Diagnose and repair flash-attn ABI compatibility against the active torch runtime")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Check whether flash-attn's compiled extension matches the active runtime
    Diagnose(DiagnoseArgs),

    /// Install a prebuilt flash-attn wheel matching the active runtime
    Install(InstallArgs),
}

/// Arguments for the diagnose command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct DiagnoseArgs {
    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: ReportFormat,
}

/// Arguments for the install command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InstallArgs {
    /// FlashAttention release tag to install from (e.g., v2.8.3).
    /// Default: latest GitHub release, with fallback to v2.8.3.
    #[arg(long)]
    pub release_tag: Option<String>,

    /// Only print the resolved wheel URL and exit
    #[arg(long)]
    pub print_url: bool,

    /// Installer backend (auto, uv, pip); auto prefers uv when available
    #[arg(long, default_value = "auto")]
    pub installer: InstallerBackend,
}

/// Output format for the diagnose report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!("Unknown report format: {s}. Valid formats: text, json")),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Execute a CLI command against the host environment
pub fn run_command(cli: Cli) -> ExitCode {
    let level = LogLevel::from_flags(cli.verbose, cli.quiet);

    match cli.command {
        Command::Diagnose(args) => commands::run_diagnose_host(&args, level),
        Command::Install(args) => commands::run_install_host(&args, level),
    }
}
