//! Release tag resolution against the GitHub release index.
//!
//! [`GitHubReleases`] answers two questions over HTTP: what is the latest
//! published release tag, and does a constructed wheel URL point at a real
//! artifact. Both calls block with a 15-second timeout and are never
//! retried. [`resolve_release_tag`] implements the fallback policy: an
//! explicit tag wins, the remote index is asked otherwise, and any index
//! failure whatsoever falls back to [`DEFAULT_RELEASE_TAG`].

use std::cell::RefCell;
use std::time::Duration;

use crate::error::FetchError;
use crate::wheel::GITHUB_REPO;

/// Fallback release tag when the remote index cannot be consulted
pub const DEFAULT_RELEASE_TAG: &str = "v2.8.3";

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Remote release index and artifact host.
pub trait ReleaseIndex {
    /// Latest published release tag.
    fn latest_release_tag(&self) -> Result<String, FetchError>;

    /// Whether `url` resolves to an existing artifact.
    ///
    /// `Ok(false)` means the host answered "not found"; transport failures
    /// and unexpected statuses are errors, not negatives.
    fn wheel_exists(&self, url: &str) -> Result<bool, FetchError>;
}

/// [`ReleaseIndex`] backed by the GitHub API and release download host.
pub struct GitHubReleases {
    client: reqwest::blocking::Client,
}

impl GitHubReleases {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("flash-doctor/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Http { message: format!("failed to create HTTP client: {e}") })?;
        Ok(Self { client })
    }
}

impl ReleaseIndex for GitHubReleases {
    fn latest_release_tag(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(format!("https://api.github.com/repos/{GITHUB_REPO}/releases/latest"))
            .header("Accept", "application/vnd.github+json")
            .send()
            .map_err(|e| FetchError::Http { message: format!("release index request failed: {e}") })?;

        if !response.status().is_success() {
            return Err(FetchError::Http {
                message: format!("release index returned {}", response.status()),
            });
        }

        let body: serde_json::Value = response.json().map_err(|e| FetchError::Http {
            message: format!("failed to parse release index JSON: {e}"),
        })?;

        match body.get("tag_name").and_then(serde_json::Value::as_str) {
            Some(tag) if !tag.is_empty() => Ok(tag.to_string()),
            _ => Err(FetchError::MissingTag),
        }
    }

    fn wheel_exists(&self, url: &str) -> Result<bool, FetchError> {
        let response = self.client.head(url).send().map_err(|e| FetchError::Http {
            message: format!("artifact existence check failed: {e}"),
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                message: format!("artifact host returned {status} for {url}"),
            });
        }
        Ok(true)
    }
}

/// How a release tag was determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSource {
    /// Supplied on the command line, used verbatim
    Explicit,
    /// Resolved from the remote release index
    Latest,
    /// Remote lookup failed; the static default was used
    Fallback { reason: String },
}

/// A release tag plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTag {
    pub tag: String,
    pub source: TagSource,
}

/// Resolve the release tag to install from.
///
/// Every index failure falls back to [`DEFAULT_RELEASE_TAG`], deliberately
/// including malformed-response failures, not just transport errors.
pub fn resolve_release_tag(explicit: Option<&str>, index: &dyn ReleaseIndex) -> ResolvedTag {
    if let Some(tag) = explicit {
        return ResolvedTag { tag: tag.to_string(), source: TagSource::Explicit };
    }
    match index.latest_release_tag() {
        Ok(tag) => ResolvedTag { tag, source: TagSource::Latest },
        Err(err) => ResolvedTag {
            tag: DEFAULT_RELEASE_TAG.to_string(),
            source: TagSource::Fallback { reason: err.to_string() },
        },
    }
}

/// Fake [`ReleaseIndex`] for tests.
///
/// Records every request so tests can assert the network was (or was not)
/// contacted.
#[derive(Debug)]
pub struct MockIndex {
    latest: Result<String, String>,
    wheel_found: bool,
    head_error: Option<String>,
    requests: RefCell<Vec<String>>,
}

impl MockIndex {
    /// Index whose latest release is `tag` and whose artifacts all exist.
    #[must_use]
    pub fn with_latest(tag: &str) -> Self {
        Self {
            latest: Ok(tag.to_string()),
            wheel_found: true,
            head_error: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Index whose latest-release lookup fails with `reason`.
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self {
            latest: Err(reason.to_string()),
            wheel_found: true,
            head_error: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Control whether existence checks find the artifact.
    #[must_use]
    pub fn with_wheel_found(mut self, found: bool) -> Self {
        self.wheel_found = found;
        self
    }

    /// Make existence checks fail outright (transport error, not a 404).
    #[must_use]
    pub fn with_head_error(mut self, message: &str) -> Self {
        self.head_error = Some(message.to_string());
        self
    }

    /// Every request made against this index, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ReleaseIndex for MockIndex {
    fn latest_release_tag(&self) -> Result<String, FetchError> {
        self.requests.borrow_mut().push("latest".to_string());
        self.latest.clone().map_err(|message| FetchError::Http { message })
    }

    fn wheel_exists(&self, url: &str) -> Result<bool, FetchError> {
        self.requests.borrow_mut().push(format!("head {url}"));
        if let Some(message) = &self.head_error {
            return Err(FetchError::Http { message: message.clone() });
        }
        Ok(self.wheel_found)
    }
}
