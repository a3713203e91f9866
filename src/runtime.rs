//! Runtime fingerprint gathering.
//!
//! A [`RuntimeFingerprint`] is the tuple of runtime version/ABI attributes
//! that selects a compatible prebuilt wheel: torch version, bundled CUDA
//! version, interpreter tag, C++ standard-library ABI flag, and platform
//! tag. It is built once per invocation and consumed only by the URL
//! construction in [`crate::wheel`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ResolveError, ResolveResult};
use crate::probe::python::PythonRuntime;
use crate::probe::SystemProbe;

static MAJOR_MINOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)").expect("Invalid major.minor regex"));

/// Platform/architecture tag of the wheel filename convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformTag {
    /// 64-bit x86 Linux
    LinuxX8664,
    /// 64-bit ARM Linux
    LinuxAarch64,
}

impl PlatformTag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformTag::LinuxX8664 => "linux_x86_64",
            PlatformTag::LinuxAarch64 => "linux_aarch64",
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes of the active runtime that select a compatible wheel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFingerprint {
    /// Full torch version string as reported
    pub torch_version: String,
    /// Leading `major.minor` of the torch version
    pub torch_major_minor: String,
    /// Bundled CUDA toolkit version as `major.minor`
    pub torch_cuda: String,
    /// Interpreter ABI tag, `cp{major}{minor}`
    pub python_tag: String,
    /// Which C++ standard-library ABI torch was built against
    pub cxx11abi: bool,
    /// Wheel platform tag
    pub platform_tag: PlatformTag,
}

/// Extract the leading `major.minor` from a version string.
///
/// Fails when the string does not start with `digits.digits`.
pub fn parse_major_minor(version: &str) -> ResolveResult<String> {
    let captures = MAJOR_MINOR_RE.captures(version).ok_or_else(|| {
        ResolveError::VersionParse { version: version.to_string() }
    })?;
    Ok(format!("{}.{}", &captures[1], &captures[2]))
}

/// Map host OS/arch identity to a wheel platform tag.
///
/// Prebuilt flash-attn wheels exist for Linux x86_64 and aarch64 only;
/// anything else is an unrecoverable environment error.
pub fn platform_tag(os: &str, arch: &str) -> ResolveResult<PlatformTag> {
    if os != "linux" {
        return Err(ResolveError::UnsupportedOs { os: os.to_string() });
    }
    match arch {
        "x86_64" | "amd64" => Ok(PlatformTag::LinuxX8664),
        "aarch64" | "arm64" => Ok(PlatformTag::LinuxAarch64),
        other => Err(ResolveError::UnsupportedArch { arch: other.to_string() }),
    }
}

/// Gather the fingerprint of the active runtime.
///
/// Platform support is checked before torch is probed, so unsupported
/// hosts fail before any subprocess or network activity. CUDA major
/// versions other than 12 are rejected here, before any URL is built.
pub fn gather_fingerprint(
    probe: &dyn SystemProbe,
    python: &dyn PythonRuntime,
) -> ResolveResult<RuntimeFingerprint> {
    let platform_tag = platform_tag(&probe.os(), &probe.arch())?;

    let torch = python
        .torch_build_info()
        .map_err(|err| ResolveError::TorchMissing { detail: err.to_string() })?;

    let torch_major_minor = parse_major_minor(&torch.version)?;

    let cuda_raw = torch.cuda.unwrap_or_default();
    if cuda_raw.is_empty() {
        return Err(ResolveError::CudaNotDetected);
    }
    let torch_cuda = parse_major_minor(&cuda_raw)?;
    if !torch_cuda.starts_with("12.") {
        return Err(ResolveError::UnsupportedCuda { version: cuda_raw });
    }

    Ok(RuntimeFingerprint {
        torch_version: torch.version,
        torch_major_minor,
        torch_cuda,
        python_tag: format!("cp{}{}", torch.python_major, torch.python_minor),
        cxx11abi: torch.cxx11abi,
        platform_tag,
    })
}
