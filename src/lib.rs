//! flash-doctor: diagnose and repair flash-attn ABI compatibility.
//!
//! Two pipelines over the active torch runtime:
//!
//! - **diagnose** probes the Python interpreter, GPU driver, CUDA toolkit,
//!   torch, and flash-attn's compiled extension, and classifies the runtime
//!   into a [`cli::commands::Diagnosis`].
//! - **install** fingerprints the runtime, resolves a FlashAttention release
//!   tag, constructs the matching prebuilt wheel URL, verifies it exists,
//!   and installs it via `uv` or `pip`.
//!
//! Ambient state (environment, subprocesses, the interpreter, the release
//! index) sits behind provider traits with public mocks, so both pipelines
//! run unmodified against fake environments in tests.

pub mod cli;
pub mod error;
pub mod installer;
pub mod probe;
pub mod release;
pub mod runtime;
pub mod wheel;

pub use error::{FetchError, ProbeError, ResolveError, ResolveResult};
pub use installer::{install_command, InstallerBackend};
pub use release::{resolve_release_tag, ReleaseIndex, DEFAULT_RELEASE_TAG};
pub use runtime::{gather_fingerprint, parse_major_minor, PlatformTag, RuntimeFingerprint};
pub use wheel::{wheel_filename, wheel_url};
