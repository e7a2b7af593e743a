//! Version completion handler.
//!
//! The cursor is first resolved to a [`CompletionTarget`]: the package, the
//! text the label starts with, and the columns a chosen item overwrites.
//! Versions are then fetched and offered newest first.

use crate::config::CompletionConfig;
use crate::document::{DocumentState, ServerState};
use pyreq_core::clamp_utf16_to_byte_offset;
use pyreq_pypi::formatter::{completion_detail, completion_label};
use pyreq_pypi::partial::{package_name_in_line, resolve_partial_in_line};
use pyreq_pypi::pyproject::parse_pyproject;
use pyreq_pypi::registry::{MetadataSource, sorted_versions};
use pyreq_pypi::resolver::{resolve_assignment, resolve_requirement};
use pyreq_pypi::types::{ContextKind, DeclarationStyle, DocumentKind, ParsedRequirement, Span};
use std::sync::Arc;
use tower_lsp_server::ls_types::{
    CompletionItem, CompletionItemKind, CompletionItemTag, CompletionParams, CompletionResponse,
    CompletionTextEdit, Position, Range, TextEdit, Uri,
};

/// Where and how version completions are inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionTarget {
    /// Normalized package name
    pub package: String,
    /// Text in front of every version (`>=`, `^`, ...)
    pub prefix: String,
    /// Columns on the cursor line replaced by the chosen item
    pub replace: Span,
}

/// Handles completion requests.
pub async fn handle_completion(
    state: Arc<ServerState>,
    registry: Arc<dyn MetadataSource>,
    config: &CompletionConfig,
    params: CompletionParams,
) -> Option<CompletionResponse> {
    let uri = &params.text_document_position.text_document.uri;
    let position = params.text_document_position.position;

    tracing::debug!(
        "completion request: uri={:?}, line={}, character={}",
        uri,
        position.line,
        position.character
    );

    let target = resolve_target(&state, uri, position)?;
    tracing::debug!(?target, "completion target");

    let metadata = match registry.fetch_metadata(&target.package).await {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::debug!("completion: no metadata for {}: {}", target.package, e);
            return None;
        }
    };

    let releases = sorted_versions(&metadata, config.include_prereleases);
    let range = Range::new(
        Position::new(position.line, target.replace.start),
        Position::new(position.line, target.replace.end),
    );

    let items: Vec<CompletionItem> = releases
        .iter()
        .take(config.max_items)
        .enumerate()
        .map(|(index, release)| {
            let label = completion_label(&target.prefix, &release.version);
            CompletionItem {
                label: label.clone(),
                kind: Some(CompletionItemKind::VALUE),
                detail: Some(completion_detail(release)),
                sort_text: Some(format!("{index:05}")),
                filter_text: Some(label.clone()),
                tags: release.yanked.then(|| vec![CompletionItemTag::DEPRECATED]),
                text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                    range,
                    new_text: label,
                })),
                ..Default::default()
            }
        })
        .collect();

    tracing::debug!("completion: returning {} items", items.len());

    if items.is_empty() {
        None
    } else {
        Some(CompletionResponse::Array(items))
    }
}

/// Resolves the completion target at `position` of an open document.
///
/// 1. A scanned requirement under the cursor decides first: assignment
///    values use the value resolver, specifiers the constraint resolver.
/// 2. When the constraint resolver finds nothing, or lands after the name
///    while something other than whitespace sits between name and cursor,
///    the raw line is resolved instead.
/// 3. Without a scanned requirement only the raw line is used. For
///    `pyproject.toml` this applies only while the document fails to parse;
///    a parsed document has no dependency strings outside its requirements.
pub fn resolve_target(state: &ServerState, uri: &Uri, position: Position) -> Option<CompletionTarget> {
    let doc = state.get_document_clone(uri)?;
    let line = doc.line(position.line)?;
    let cursor = position.character;

    if let Some(requirement) = state.requirement_at(uri, position) {
        match &requirement.style {
            DeclarationStyle::Assignment { value } => {
                let value = value.as_ref().filter(|v| v.line == position.line)?;
                let ctx = resolve_assignment(value, cursor)?;
                return Some(CompletionTarget {
                    package: requirement.spec.identifier.clone(),
                    prefix: ctx.prefix,
                    replace: ctx.replace,
                });
            }
            DeclarationStyle::Specifier => {
                let resolved = resolve_requirement(&requirement, position.line, cursor, line);
                let needs_fallback = match resolved {
                    None => true,
                    Some(ctx) => {
                        ctx.kind == ContextKind::AfterName
                            && typed_after_name(&requirement, line, cursor)
                    }
                };
                if !needs_fallback && let Some(ctx) = resolved {
                    return Some(CompletionTarget {
                        package: requirement.spec.identifier.clone(),
                        prefix: ctx.operator.to_string(),
                        replace: ctx.replace,
                    });
                }
                return resolve_in_line(&doc, line, cursor, Some(&requirement));
            }
        }
    }

    if doc.kind == DocumentKind::Pyproject && parse_pyproject(&doc.content).is_ok() {
        return None;
    }
    resolve_in_line(&doc, line, cursor, None)
}

/// `true` when non-whitespace text sits between the requirement head and the cursor.
fn typed_after_name(requirement: &ParsedRequirement, line: &str, cursor: u32) -> bool {
    let from = requirement.origin() + requirement.spec.head_end();
    if cursor <= from {
        return false;
    }
    let start = clamp_utf16_to_byte_offset(line, from);
    let end = clamp_utf16_to_byte_offset(line, cursor).max(start);
    !line[start..end].trim().is_empty()
}

fn resolve_in_line(
    doc: &DocumentState,
    line: &str,
    cursor: u32,
    requirement: Option<&ParsedRequirement>,
) -> Option<CompletionTarget> {
    let ctx = resolve_partial_in_line(line, cursor, doc.kind)?;
    let package = match requirement {
        Some(req) => req.spec.identifier.clone(),
        None => package_name_in_line(line, cursor, doc.kind)?,
    };
    Some(CompletionTarget {
        package,
        prefix: ctx.operator.to_string(),
        replace: ctx.replace,
    })
}
