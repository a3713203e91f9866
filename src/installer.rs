//! Installer backend selection and invocation.

use std::fmt;
use std::str::FromStr;

use crate::probe::SystemProbe;

/// Which tool performs the wheel install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallerBackend {
    /// Prefer `uv` when present on PATH, else `pip`
    #[default]
    Auto,
    Uv,
    Pip,
}

impl FromStr for InstallerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(InstallerBackend::Auto),
            "uv" => Ok(InstallerBackend::Uv),
            "pip" => Ok(InstallerBackend::Pip),
            _ => Err(format!("Unknown installer backend: {s}. Valid backends: auto, uv, pip")),
        }
    }
}

impl fmt::Display for InstallerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallerBackend::Auto => write!(f, "auto"),
            InstallerBackend::Uv => write!(f, "uv"),
            InstallerBackend::Pip => write!(f, "pip"),
        }
    }
}

/// Build the install invocation for a verified wheel URL.
///
/// The install is deliberately surgical: force-reinstall, no dependency
/// resolution, one direct URL. `pip` runs through the probed interpreter
/// so the wheel lands in the environment that was fingerprinted.
#[must_use]
pub fn install_command(
    backend: InstallerBackend,
    python_exe: &str,
    wheel_url: &str,
    probe: &dyn SystemProbe,
) -> Vec<String> {
    let backend = match backend {
        InstallerBackend::Auto => {
            if probe.has_command("uv") {
                InstallerBackend::Uv
            } else {
                InstallerBackend::Pip
            }
        }
        chosen => chosen,
    };

    match backend {
        InstallerBackend::Uv => {
            ["uv", "pip", "install", "--force-reinstall", "--no-deps", wheel_url]
                .map(String::from)
                .to_vec()
        }
        _ => [python_exe, "-m", "pip", "install", "--force-reinstall", "--no-deps", wheel_url]
            .map(String::from)
            .to_vec(),
    }
}
