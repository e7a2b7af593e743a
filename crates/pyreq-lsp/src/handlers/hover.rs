//! Hover handler: package metadata for the requirement under the cursor.

use crate::document::ServerState;
use pyreq_pypi::formatter::{NOT_FOUND_MESSAGE, hover_markdown};
use pyreq_pypi::registry::MetadataSource;
use std::sync::Arc;
use tower_lsp_server::ls_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};

/// Handles hover requests.
///
/// Lookup failures are shown in the hover itself rather than dropped, so the
/// user can tell a missing package from an unreachable index.
pub async fn handle_hover(
    state: Arc<ServerState>,
    registry: Arc<dyn MetadataSource>,
    params: HoverParams,
) -> Option<Hover> {
    let uri = &params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;

    let requirement = state.requirement_at(uri, position)?;

    let value = match registry.fetch_metadata(requirement.identifier()).await {
        Ok(metadata) => hover_markdown(&metadata, &requirement.spec),
        Err(e) if e.is_not_found() => NOT_FOUND_MESSAGE.to_string(),
        Err(e) => {
            tracing::warn!("hover: metadata fetch failed for {}: {}", requirement.identifier(), e);
            e.to_string()
        }
    };

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(requirement.range),
    })
}
