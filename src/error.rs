//! Error types for environment probing, release resolution, and install.
//!
//! Three families, one per failure kind: [`ProbeError`] for subprocess and
//! interpreter probes (rendered inline, never fatal on their own),
//! [`FetchError`] for the remote release index and artifact host, and
//! [`ResolveError`] for unrecoverable environment errors that abort the
//! install pipeline.

use thiserror::Error;

/// Result type for install-resolution operations
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Failure of a subprocess or interpreter probe
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probed program could not be started
    #[error("{program} could not be started: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The probed program ran but exited non-zero
    #[error("{program}: {detail}")]
    NonZeroExit {
        program: String,
        status: String,
        detail: String,
    },

    /// The probed program produced output we could not decode
    #[error("{program} produced unreadable output: {detail}")]
    InvalidOutput { program: String, detail: String },

    /// No Python interpreter could be resolved
    #[error("no Python interpreter found (tried $PYTHON, python3, python)")]
    NoInterpreter,
}

impl ProbeError {
    /// Short kind label embedded in `<unavailable: ...>` placeholders
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "SpawnError",
            Self::NonZeroExit { .. } => "NonZeroExit",
            Self::InvalidOutput { .. } => "InvalidOutput",
            Self::NoInterpreter => "NoInterpreter",
        }
    }
}

/// Failure talking to the remote release index or artifact host
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport error, non-success status, or undecodable body
    #[error("{message}")]
    Http { message: String },

    /// The release index response carried no usable tag
    #[error("release index response did not include tag_name")]
    MissingTag,
}

/// Unrecoverable environment errors during install resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    /// torch is not importable in the target environment
    #[error("torch must be importable in the target environment before installing flash-attn: {detail}")]
    TorchMissing { detail: String },

    /// A version string did not start with `digits.digits`
    #[error("unable to parse version string: {version}")]
    VersionParse { version: String },

    /// torch reports no bundled CUDA runtime
    #[error("CUDA runtime not detected in torch (torch.version.cuda is empty)")]
    CudaNotDetected,

    /// torch's CUDA runtime is outside the cu12 wheel family
    #[error("unsupported torch CUDA runtime {version}: prebuilt flash-attn wheels target cu12 only")]
    UnsupportedCuda { version: String },

    /// Prebuilt wheels exist for Linux only
    #[error("prebuilt flash-attn wheels are supported on Linux only (detected {os})")]
    UnsupportedOs { os: String },

    /// Prebuilt wheels exist for x86_64 and aarch64 only
    #[error("unsupported machine architecture: {arch}")]
    UnsupportedArch { arch: String },

    /// A required probe failed in a way we cannot work around
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// A network operation failed in a way that is not "artifact missing"
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
