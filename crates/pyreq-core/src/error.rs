use thiserror::Error;

/// Core error types for pyreq-lsp.
///
/// Covers the failures shared by every crate in the workspace: transport
/// errors from the HTTP cache, non-success registry statuses, and
/// deserialization problems. Parsing a requirements document never produces
/// one of these; a line that is not a requirement is simply absent from the
/// result.
///
/// # Examples
///
/// ```
/// use pyreq_core::error::{PyreqError, Result};
///
/// fn check_status(url: &str, status: u16) -> Result<()> {
///     if status != 200 {
///         return Err(PyreqError::HttpStatus {
///             url: url.into(),
///             status,
///         });
///     }
///     Ok(())
/// }
///
/// assert!(check_status("https://pypi.org/pypi/x/json", 404).is_err());
/// ```
#[derive(Error, Debug)]
pub enum PyreqError {
    #[error("request failed for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("insecure URL rejected: {0}")]
    InsecureUrl(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PyreqError {
    /// Returns `true` when the registry answered with HTTP 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 404, .. })
    }
}

/// Convenience type alias for `Result<T, PyreqError>`.
pub type Result<T> = std::result::Result<T, PyreqError>;
