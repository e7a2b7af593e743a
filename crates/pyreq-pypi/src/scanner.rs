//! Document scanning with a bounded per-document cache.

use crate::pyproject::parse_pyproject;
use crate::requirements::parse_requirements;
use crate::types::{DocumentKind, ParsedRequirement};
use lru::LruCache;
use pyreq_core::range_contains;
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use tower_lsp_server::ls_types::{Position, Uri};

/// Name used by Poetry and pixi tables for the interpreter itself.
const INTERPRETER_PSEUDO_PACKAGE: &str = "python";

/// Default number of documents whose scan results are retained.
pub const DEFAULT_CAPACITY: usize = 200;

impl DocumentKind {
    /// Picks the dialect of a document from its language id and URI.
    ///
    /// Returns `None` for documents this server does not handle.
    ///
    /// # Examples
    ///
    /// ```
    /// use pyreq_pypi::types::DocumentKind;
    /// use tower_lsp_server::ls_types::Uri;
    ///
    /// let uri = Uri::from_file_path("/work/requirements-dev.txt").unwrap();
    /// assert_eq!(DocumentKind::detect(None, &uri), Some(DocumentKind::Requirements));
    ///
    /// let uri = Uri::from_file_path("/work/PyProject.toml").unwrap();
    /// assert_eq!(DocumentKind::detect(Some("toml"), &uri), Some(DocumentKind::Pyproject));
    ///
    /// let uri = Uri::from_file_path("/work/Cargo.toml").unwrap();
    /// assert_eq!(DocumentKind::detect(Some("toml"), &uri), None);
    /// ```
    pub fn detect(language_id: Option<&str>, uri: &Uri) -> Option<Self> {
        let path = uri.path().as_str().to_ascii_lowercase();
        let file_name = path.rsplit('/').next().unwrap_or(&path);

        if file_name == "pyproject.toml" {
            return Some(Self::Pyproject);
        }
        if language_id == Some("pip-requirements") || is_requirements_file(&path, file_name) {
            return Some(Self::Requirements);
        }
        if language_id == Some("toml") && uri.scheme().as_str() != "file" {
            return Some(Self::Pyproject);
        }
        None
    }
}

fn is_requirements_file(path: &str, file_name: &str) -> bool {
    if file_name.ends_with(".in") {
        return true;
    }
    let Some(stem) = file_name.strip_suffix(".txt") else {
        return false;
    };
    stem.starts_with("requirements")
        || stem.starts_with("constraints")
        || stem.ends_with("-requirements")
        || stem.ends_with("_requirements")
        || path.contains("/requirements/")
}

/// Scans a document without caching.
///
/// The interpreter pseudo-package is dropped and the result is in document
/// order. A `pyproject.toml` that fails to parse yields no requirements.
pub fn scan_document(kind: DocumentKind, content: &str) -> Vec<ParsedRequirement> {
    let mut requirements = match kind {
        DocumentKind::Requirements => parse_requirements(content),
        DocumentKind::Pyproject => match parse_pyproject(content) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed pyproject.toml");
                Vec::new()
            }
        },
    };

    requirements.retain(|r| r.identifier() != INTERPRETER_PSEUDO_PACKAGE);
    requirements.sort_by_key(|r| (r.range.start.line, r.range.start.character));
    requirements
}

struct CachedScan {
    version: i32,
    requirements: Arc<[ParsedRequirement]>,
}

/// Scanner that remembers the requirements of recently seen documents.
///
/// Entries are keyed by URI and tagged with the document version. A request
/// for a different version rescans and replaces the entry; old and new
/// results are never merged. A cache hit marks the document as recently used;
/// the least recently used document is evicted first.
///
/// # Examples
///
/// ```
/// use pyreq_pypi::scanner::DocumentScanner;
/// use pyreq_pypi::types::DocumentKind;
/// use tower_lsp_server::ls_types::Uri;
///
/// let scanner = DocumentScanner::new();
/// let uri = Uri::from_file_path("/work/requirements.txt").unwrap();
///
/// let found = scanner.scan(&uri, 1, DocumentKind::Requirements, "flask\nrequests>=2\n");
/// assert_eq!(found.len(), 2);
///
/// let found = scanner.scan(&uri, 2, DocumentKind::Requirements, "flask\n");
/// assert_eq!(found.len(), 1);
/// assert_eq!(scanner.len(), 1);
/// ```
pub struct DocumentScanner {
    inner: RwLock<LruCache<Uri, CachedScan>>,
}

impl std::fmt::Debug for DocumentScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentScanner")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for DocumentScanner {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DocumentScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Returns the requirements of `uri` at `version`, scanning if needed.
    pub fn scan(
        &self,
        uri: &Uri,
        version: i32,
        kind: DocumentKind,
        content: &str,
    ) -> Arc<[ParsedRequirement]> {
        if let Ok(mut guard) = self.inner.write()
            && let Some(cached) = guard.get(uri)
            && cached.version == version
        {
            return Arc::clone(&cached.requirements);
        }

        let requirements: Arc<[ParsedRequirement]> = scan_document(kind, content).into();
        tracing::debug!(
            uri = uri.as_str(),
            version,
            requirements = %describe(&requirements),
            "scanned document"
        );

        if let Ok(mut guard) = self.inner.write() {
            guard.push(
                uri.clone(),
                CachedScan {
                    version,
                    requirements: Arc::clone(&requirements),
                },
            );
        }
        requirements
    }

    /// The first requirement whose range contains `position`.
    pub fn requirement_at(
        &self,
        uri: &Uri,
        version: i32,
        kind: DocumentKind,
        content: &str,
        position: Position,
    ) -> Option<ParsedRequirement> {
        self.scan(uri, version, kind, content)
            .iter()
            .find(|r| range_contains(&r.range, position))
            .cloned()
    }

    /// Drops the entry of a closed document.
    pub fn invalidate(&self, uri: &Uri) {
        if let Ok(mut guard) = self.inner.write() {
            guard.pop(uri);
        }
    }

    /// Changes the number of retained documents, evicting the oldest on shrink.
    pub fn resize(&self, capacity: usize) {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        if let Ok(mut guard) = self.inner.write() {
            guard.resize(capacity);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map_or(0, |guard| guard.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `name @ line#col - line#col` for every requirement, one per line.
fn describe(requirements: &[ParsedRequirement]) -> String {
    requirements
        .iter()
        .map(|r| {
            format!(
                "{} @ {}#{} - {}#{}",
                r.identifier(),
                r.range.start.line,
                r.range.start.character,
                r.range.end.line,
                r.range.end.character
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
