//! Python requirement parsing and cursor-context resolution for pyreq-lsp.
//!
//! This crate finds dependency declarations in pip requirements files and
//! `pyproject.toml`, and decides, for a cursor inside one of them, which
//! version-constraint operator a completion should insert and which columns
//! it replaces.
//!
//! # Architecture
//!
//! - **Extractor** ([`requirement`]): a loose PEP 508 grammar that tolerates
//!   whitespace and half-typed constraints, with a strict `pep508_rs` fallback
//!   for direct references
//! - **Locators** ([`requirements`], [`pyproject`]): per-dialect document
//!   scanning, keeping exact UTF-16 ranges (`toml_edit` spans for TOML)
//! - **Scanner** ([`scanner`]): dialect detection plus an LRU of scan results
//!   keyed by document version
//! - **Resolvers** ([`resolver`], [`partial`]): cursor rules over a parsed
//!   requirement, and a text-only fallback for documents mid-edit
//! - **Registry** ([`registry`], [`formatter`]): PyPI JSON API client over the
//!   shared HTTP cache, and presentation of its metadata
//!
//! # Examples
//!
//! ```
//! use pyreq_pypi::scanner::scan_document;
//! use pyreq_pypi::resolver::resolve_requirement;
//! use pyreq_pypi::types::{DocumentKind, Operator};
//!
//! let content = "[project]\ndependencies = [\"requests>=2.28,<3\"]\n";
//! let requirements = scan_document(DocumentKind::Pyproject, content);
//! assert_eq!(requirements[0].identifier(), "requests");
//!
//! // cursor right after `<`
//! let line = "dependencies = [\"requests>=2.28,<3\"]";
//! let ctx = resolve_requirement(&requirements[0], 1, 33, line).unwrap();
//! assert_eq!(ctx.operator, Operator::Less);
//! ```
//!
//! ## Supported locations
//!
//! ```toml
//! [project]
//! dependencies = ["requests>=2.28"]
//!
//! [project.optional-dependencies]
//! dev = ["pytest>=7.0"]
//!
//! [dependency-groups]
//! test = ["coverage", { include-group = "dev" }]
//!
//! [build-system]
//! requires = ["setuptools>=61"]
//!
//! [tool.uv]
//! dev-dependencies = ["ruff"]
//!
//! [tool.poetry.dependencies]
//! django = "^4.2"
//! celery = { version = ">=5.3", extras = ["redis"] }
//!
//! [tool.pixi.pypi-dependencies]
//! numpy = ">=1.24"
//! ```

pub mod error;
pub mod formatter;
pub mod partial;
pub mod pyproject;
pub mod registry;
pub mod requirement;
pub mod requirements;
pub mod resolver;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use error::{PypiError, Result};
pub use registry::{MetadataSource, PypiRegistry};
pub use scanner::{DocumentScanner, scan_document};
pub use types::{
    ContextKind, CursorContext, DeclarationStyle, DependencySection, DocumentKind, Operator,
    PackageMetadata, ParsedRequirement, RequirementSpec, Span, ValueContext,
};
