//! Errors specific to Python requirement handling.
//!
//! Parsing never fails through this type: a line that is not a requirement
//! yields `None` and a malformed `pyproject.toml` yields an empty scan. These
//! errors come from the PyPI metadata client.

use thiserror::Error;

/// Errors specific to PyPI metadata lookups.
#[derive(Error, Debug)]
pub enum PypiError {
    /// Package does not exist on the index (HTTP 404)
    #[error("Package not found in PyPI: '{package}'")]
    PackageNotFound { package: String },

    /// Index unreachable or answered with an unexpected status
    #[error("Cannot connect to PyPI for '{package}': {source}")]
    RegistryError {
        package: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Response body is not the expected JSON document
    #[error("Failed to parse PyPI API response for '{package}': {source}")]
    ApiResponseError {
        package: String,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to parse pyproject.toml
    #[error("Failed to parse pyproject.toml: {source}")]
    TomlParseError {
        #[source]
        source: toml_edit::TomlError,
    },
}

/// Result type alias for PyPI operations.
pub type Result<T> = std::result::Result<T, PypiError>;

impl PypiError {
    /// Create a registry error from any error type.
    pub fn registry_error(
        package: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::RegistryError {
            package: package.into(),
            source: Box::new(error),
        }
    }

    /// Create an API response error.
    pub fn api_response_error(package: impl Into<String>, error: serde_json::Error) -> Self {
        Self::ApiResponseError {
            package: package.into(),
            source: error,
        }
    }

    /// Maps a transport-level error for `package` onto the PyPI taxonomy.
    pub fn from_core(package: impl Into<String>, error: pyreq_core::PyreqError) -> Self {
        let package = package.into();
        if error.is_not_found() {
            Self::PackageNotFound { package }
        } else {
            Self::registry_error(package, error)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PackageNotFound { .. })
    }
}

/// Convert to pyreq_core::PyreqError for interoperability
impl From<PypiError> for pyreq_core::PyreqError {
    fn from(err: PypiError) -> Self {
        match err {
            PypiError::ApiResponseError { source, .. } => pyreq_core::PyreqError::Json(source),
            other => pyreq_core::PyreqError::CacheError(other.to_string()),
        }
    }
}
