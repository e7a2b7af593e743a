//! Language server for Python requirement files.
//!
//! Serves hover, code lens and version completion for pip requirements files
//! and `pyproject.toml`, on top of the parsing engine in `pyreq-pypi`.

pub mod config;
pub mod document;
pub mod error;
pub mod handlers;
pub mod server;
mod test_utils;

// Re-export commonly used types
pub use error::{LspError, Result};
pub use server::Backend;
