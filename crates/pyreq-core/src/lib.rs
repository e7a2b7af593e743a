//! Core utilities for pyreq-lsp.
//!
//! This crate holds the pieces shared by the parsing engine and the language
//! server that know nothing about Python packaging:
//! - **Text positions**: UTF-16 column arithmetic and a line offset table
//! - **HTTP Cache**: Shared caching layer with ETag/Last-Modified validation
//! - **Error Types**: The error enum every other crate converts into
//!
//! # Examples
//!
//! ```
//! use pyreq_core::text::{LineOffsetTable, utf16_len};
//!
//! let content = "requests>=2.28\nflask";
//! let table = LineOffsetTable::new(content);
//! let pos = table.position_at(content, content.find("flask").unwrap());
//! assert_eq!((pos.line, pos.character), (1, 0));
//! assert_eq!(utf16_len("flask"), 5);
//! ```

pub mod cache;
pub mod error;
pub mod text;

pub use cache::{CachedResponse, HttpCache, HttpCacheConfig};
pub use error::{PyreqError, Result};
pub use text::{
    LineOffsetTable, clamp_utf16_to_byte_offset, line_at, range_contains, utf16_len,
    utf16_to_byte_offset,
};
