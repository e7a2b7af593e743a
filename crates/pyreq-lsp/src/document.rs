//! Open document store.
//!
//! Documents are kept in full (the server uses full text sync) together with
//! the dialect picked when they were opened. Requirement lists are not stored
//! here; they come from the [`DocumentScanner`], which caches them per
//! document version.

use crate::error::{LspError, Result};
use dashmap::DashMap;
use pyreq_pypi::scanner::{DEFAULT_CAPACITY, DocumentScanner};
use pyreq_pypi::types::{DocumentKind, ParsedRequirement};
use std::sync::Arc;
use tower_lsp_server::ls_types::{Position, Uri};

/// State of a single open document.
#[derive(Debug, Clone)]
pub struct DocumentState {
    pub content: String,
    pub version: i32,
    pub kind: DocumentKind,
}

impl DocumentState {
    pub fn new(content: String, version: i32, kind: DocumentKind) -> Self {
        Self {
            content,
            version,
            kind,
        }
    }

    /// Text of line `line`, without its terminator.
    pub fn line(&self, line: u32) -> Option<&str> {
        pyreq_core::line_at(&self.content, line)
    }
}

/// Global server state shared by all handlers.
///
/// # Examples
///
/// ```
/// use pyreq_lsp::document::ServerState;
/// use tower_lsp_server::ls_types::{Position, Uri};
///
/// let state = ServerState::new();
/// let uri = Uri::from_file_path("/w/requirements.txt").unwrap();
/// state.open_document(uri.clone(), None, 1, "flask>=3\n".into()).unwrap();
///
/// let req = state.requirement_at(&uri, Position::new(0, 2)).unwrap();
/// assert_eq!(req.identifier(), "flask");
/// ```
#[derive(Debug)]
pub struct ServerState {
    /// Open documents by URI
    pub documents: DashMap<Uri, DocumentState>,
    /// Scan results by URI and version
    pub scanner: DocumentScanner,
}

impl ServerState {
    pub fn new() -> Self {
        Self::with_scan_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_scan_capacity(capacity: usize) -> Self {
        Self {
            documents: DashMap::new(),
            scanner: DocumentScanner::with_capacity(capacity),
        }
    }

    /// Registers an opened document.
    ///
    /// # Errors
    ///
    /// [`LspError::UnsupportedDocument`] when the document is neither a
    /// requirements file nor a `pyproject.toml`; nothing is stored then.
    pub fn open_document(
        &self,
        uri: Uri,
        language_id: Option<&str>,
        version: i32,
        content: String,
    ) -> Result<DocumentKind> {
        let kind = DocumentKind::detect(language_id, &uri).ok_or_else(|| {
            LspError::UnsupportedDocument {
                uri: uri.as_str().to_string(),
            }
        })?;
        self.documents
            .insert(uri, DocumentState::new(content, version, kind));
        Ok(kind)
    }

    /// Replaces the content of an open document.
    ///
    /// # Errors
    ///
    /// [`LspError::DocumentNotFound`] when the document was never opened.
    pub fn change_document(&self, uri: &Uri, version: i32, content: String) -> Result<()> {
        let mut doc = self
            .documents
            .get_mut(uri)
            .ok_or_else(|| LspError::DocumentNotFound {
                uri: uri.as_str().to_string(),
            })?;
        doc.content = content;
        doc.version = version;
        Ok(())
    }

    /// Forgets a document and its scan results.
    pub fn close_document(&self, uri: &Uri) -> Option<DocumentState> {
        self.scanner.invalidate(uri);
        self.documents.remove(uri).map(|(_, doc)| doc)
    }

    /// Retrieves document state by URI.
    ///
    /// The reference holds a lock on the internal map, so it should be
    /// dropped as soon as possible.
    pub fn get_document(
        &self,
        uri: &Uri,
    ) -> Option<dashmap::mapref::one::Ref<'_, Uri, DocumentState>> {
        self.documents.get(uri)
    }

    /// Retrieves a cloned copy of document state, releasing the map lock.
    ///
    /// Use this before any `.await`.
    pub fn get_document_clone(&self, uri: &Uri) -> Option<DocumentState> {
        self.documents.get(uri).map(|doc| doc.clone())
    }

    /// Requirements of an open document, in document order.
    pub fn requirements(&self, uri: &Uri) -> Option<Arc<[ParsedRequirement]>> {
        let doc = self.documents.get(uri)?;
        Some(self.scanner.scan(uri, doc.version, doc.kind, &doc.content))
    }

    /// The requirement of an open document whose range contains `position`.
    pub fn requirement_at(&self, uri: &Uri, position: Position) -> Option<ParsedRequirement> {
        let doc = self.documents.get(uri)?;
        self.scanner
            .requirement_at(uri, doc.version, doc.kind, &doc.content, position)
    }

    /// Returns the number of open documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}
