//! flash-doctor CLI
//!
//! Compatibility doctor for flash-attn against the active torch runtime.
//!
//! # Usage
//!
//! ```bash
//! # Is the installed flash-attn ABI-compatible with this runtime?
//! flash-doctor diagnose
//!
//! # Install a matching prebuilt wheel
//! flash-doctor install
//!
//! # Resolve the wheel URL without installing
//! flash-doctor install --print-url
//!
//! # Pin a release and force a backend
//! flash-doctor install --release-tag v2.8.3 --installer pip
//! ```

use clap::Parser;
use flash_doctor::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    run_command(cli)
}
