//! PyPI metadata client.
//!
//! Metadata comes from the JSON API (<https://pypi.org/pypi/{package}/json>).
//! Requests go through the shared [`HttpCache`], so repeated lookups are
//! revalidated with ETag/Last-Modified instead of refetched.

use crate::error::{PypiError, Result};
use crate::requirement::normalize_package_name;
use crate::types::{PackageMetadata, ReleaseFile, ReleaseSummary};
use async_trait::async_trait;
use pep440_rs::Version;
use pyreq_core::HttpCache;
use std::str::FromStr;
use std::sync::Arc;

/// Default JSON API root.
pub const PYPI_BASE: &str = "https://pypi.org/pypi";

/// Base URL for package pages on pypi.org
pub const PYPI_URL: &str = "https://pypi.org/project";

/// Source of package metadata.
///
/// The language server only depends on this trait, so tests can substitute
/// an in-memory source for the network.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetches metadata for `name`.
    ///
    /// A package the index does not know yields
    /// [`PypiError::PackageNotFound`]; every other failure is a
    /// [`PypiError::RegistryError`] or [`PypiError::ApiResponseError`].
    async fn fetch_metadata(&self, name: &str) -> Result<PackageMetadata>;
}

/// Returns the URL for a package's page on pypi.org.
///
/// Package names are normalized and URL-encoded to prevent path traversal attacks.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::registry::package_url;
///
/// assert_eq!(package_url("Django_REST"), "https://pypi.org/project/django-rest");
/// ```
pub fn package_url(name: &str) -> String {
    let normalized = normalize_package_name(name);
    format!("{}/{}", PYPI_URL, urlencoding::encode(&normalized))
}

/// Client for the PyPI JSON API.
///
/// # Examples
///
/// ```no_run
/// # use pyreq_pypi::registry::{MetadataSource, PypiRegistry};
/// # use pyreq_core::HttpCache;
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() {
/// let registry = PypiRegistry::new(Arc::new(HttpCache::new()));
/// let metadata = registry.fetch_metadata("requests").await.unwrap();
/// assert_eq!(metadata.info.name, "requests");
/// # }
/// ```
#[derive(Clone)]
pub struct PypiRegistry {
    cache: Arc<HttpCache>,
    base_url: String,
}

impl std::fmt::Debug for PypiRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PypiRegistry")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PypiRegistry {
    /// Creates a client for pypi.org.
    pub fn new(cache: Arc<HttpCache>) -> Self {
        Self::with_base_url(cache, PYPI_BASE)
    }

    /// Creates a client for a mirror exposing the same JSON API.
    pub fn with_base_url(cache: Arc<HttpCache>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { cache, base_url }
    }

    /// JSON API URL of a package.
    pub fn metadata_url(&self, name: &str) -> String {
        let normalized = normalize_package_name(name);
        format!(
            "{}/{}/json",
            self.base_url,
            urlencoding::encode(&normalized)
        )
    }
}

#[async_trait]
impl MetadataSource for PypiRegistry {
    async fn fetch_metadata(&self, name: &str) -> Result<PackageMetadata> {
        let url = self.metadata_url(name);
        let data = self.cache.get_cached(&url).await.map_err(|e| {
            let error = PypiError::from_core(name, e);
            if error.is_not_found() {
                tracing::debug!(package = name, "package not found on index");
            } else {
                tracing::warn!(package = name, error = %error, "metadata fetch failed");
            }
            error
        })?;

        parse_package_metadata(name, &data)
    }
}

/// Parses a JSON API response body.
pub fn parse_package_metadata(package_name: &str, data: &[u8]) -> Result<PackageMetadata> {
    serde_json::from_slice(data).map_err(|e| PypiError::api_response_error(package_name, e))
}

/// Newest upload time among the files of a release.
///
/// Times are ISO 8601 strings, which order lexicographically.
pub fn latest_upload_time(files: &[ReleaseFile]) -> Option<&str> {
    files.iter().filter_map(|f| f.upload_time.as_deref()).max()
}

/// Releases of a package, newest first.
///
/// PEP 440 versions come first in descending order; versions that do not
/// parse follow in their original order. Releases without files are kept.
/// Pre-releases are dropped unless `include_prereleases` is set.
pub fn sorted_versions(metadata: &PackageMetadata, include_prereleases: bool) -> Vec<ReleaseSummary> {
    let mut parsed = Vec::new();
    let mut unparsed = Vec::new();

    for (version, files) in &metadata.releases {
        let summary = |prerelease| ReleaseSummary {
            version: version.clone(),
            upload_time: latest_upload_time(files).map(String::from),
            yanked: files.iter().any(|f| f.yanked),
            prerelease,
        };
        match Version::from_str(version) {
            Ok(v) => {
                let prerelease = v.any_prerelease();
                if prerelease && !include_prereleases {
                    continue;
                }
                parsed.push((v, summary(prerelease)));
            }
            Err(_) => unparsed.push(summary(false)),
        }
    }

    parsed.sort_by(|a, b| b.0.cmp(&a.0));
    parsed
        .into_iter()
        .map(|(_, summary)| summary)
        .chain(unparsed)
        .collect()
}
