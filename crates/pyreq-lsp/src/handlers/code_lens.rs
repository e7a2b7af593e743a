//! Code lens handler: the latest release above every requirement.

use crate::document::ServerState;
use futures::future::join_all;
use pyreq_pypi::formatter::lens_title;
use pyreq_pypi::registry::MetadataSource;
use std::sync::Arc;
use tower_lsp_server::ls_types::{CodeLens, CodeLensParams, Command, Range};

/// Handles code lens requests.
///
/// Metadata for all requirements is fetched concurrently. Requirements whose
/// lookup fails get no lens.
pub async fn handle_code_lens(
    state: Arc<ServerState>,
    registry: Arc<dyn MetadataSource>,
    params: CodeLensParams,
) -> Vec<CodeLens> {
    let uri = &params.text_document.uri;
    let Some(requirements) = state.requirements(uri) else {
        return vec![];
    };

    let lookups = requirements.iter().map(|requirement| {
        let registry = Arc::clone(&registry);
        async move {
            let metadata = registry.fetch_metadata(requirement.identifier()).await;
            (requirement, metadata)
        }
    });

    join_all(lookups)
        .await
        .into_iter()
        .filter_map(|(requirement, metadata)| match metadata {
            Ok(metadata) => Some(CodeLens {
                range: Range::new(requirement.range.start, requirement.range.start),
                command: Some(Command {
                    title: lens_title(&metadata, &requirement.spec),
                    command: String::new(),
                    arguments: None,
                }),
                data: None,
            }),
            Err(e) => {
                tracing::debug!("code lens: skipping {}: {}", requirement.identifier(), e);
                None
            }
        })
        .collect()
}
