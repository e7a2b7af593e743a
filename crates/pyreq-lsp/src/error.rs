use pyreq_pypi::PypiError;
use thiserror::Error;

/// Error types for the pyreq-lsp server.
///
/// Handlers never surface these to the client as JSON-RPC errors; they are
/// logged and the request degrades to an empty answer.
///
/// # Examples
///
/// ```
/// use pyreq_lsp::error::{LspError, Result};
///
/// fn load(options: serde_json::Value) -> Result<pyreq_lsp::config::PyreqConfig> {
///     Ok(serde_json::from_value(options)?)
/// }
///
/// assert!(load(serde_json::json!({})).is_ok());
/// assert!(matches!(load(serde_json::json!([1])), Err(LspError::Json(_))));
/// ```
#[derive(Error, Debug)]
pub enum LspError {
    #[error("unsupported document: {uri}")]
    UnsupportedDocument { uri: String },

    #[error("document not open: {uri}")]
    DocumentNotFound { uri: String },

    #[error(transparent)]
    Pypi(#[from] PypiError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for `Result<T, LspError>`.
pub type Result<T> = std::result::Result<T, LspError>;
