use crate::config::PyreqConfig;
use crate::document::ServerState;
use crate::error::{LspError, Result as LspResult};
use crate::handlers::{code_lens, completion, hover};
use pyreq_core::{HttpCache, HttpCacheConfig};
use pyreq_pypi::registry::{MetadataSource, PypiRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_lsp_server::ls_types::{
    CodeLens, CodeLensOptions, CodeLensParams, CompletionOptions, CompletionParams,
    CompletionResponse, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, Hover, HoverParams, HoverProviderCapability, InitializeParams,
    InitializeResult, InitializedParams, MessageType, ServerCapabilities, ServerInfo,
    TextDocumentSyncCapability, TextDocumentSyncKind,
};
use tower_lsp_server::{Client, LanguageServer, jsonrpc::Result};

/// Characters that open or continue a version constraint.
const TRIGGER_CHARACTERS: [&str; 7] = ["=", "<", ">", "~", "!", ",", " "];

/// Builds the PyPI client described by `config`.
fn build_registry(config: &PyreqConfig) -> Arc<dyn MetadataSource> {
    let cache = Arc::new(HttpCache::with_config(HttpCacheConfig {
        max_entries: config.cache.http_max_entries,
        timeout: Duration::from_secs(config.cache.http_timeout_secs),
        ..Default::default()
    }));
    Arc::new(PypiRegistry::with_base_url(
        cache,
        config.registry.index_url.as_str(),
    ))
}

fn parse_options(options: serde_json::Value) -> LspResult<PyreqConfig> {
    Ok(serde_json::from_value(options)?)
}

pub struct Backend {
    client: Client,
    state: Arc<ServerState>,
    config: Arc<RwLock<PyreqConfig>>,
    registry: RwLock<Arc<dyn MetadataSource>>,
    /// Set when the registry was injected and must survive `initialize`
    registry_pinned: bool,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        let config = PyreqConfig::default();
        let registry = build_registry(&config);
        Self::build(client, config, registry, false)
    }

    /// Creates a backend that answers from `registry` instead of pypi.org.
    pub fn with_registry(client: Client, registry: Arc<dyn MetadataSource>) -> Self {
        Self::build(client, PyreqConfig::default(), registry, true)
    }

    fn build(
        client: Client,
        config: PyreqConfig,
        registry: Arc<dyn MetadataSource>,
        registry_pinned: bool,
    ) -> Self {
        Self {
            client,
            state: Arc::new(ServerState::with_scan_capacity(config.cache.document_capacity)),
            config: Arc::new(RwLock::new(config)),
            registry: RwLock::new(registry),
            registry_pinned,
        }
    }

    async fn registry(&self) -> Arc<dyn MetadataSource> {
        Arc::clone(&*self.registry.read().await)
    }

    async fn apply_config(&self, config: PyreqConfig) {
        tracing::debug!("loaded configuration: {:?}", config);
        self.state.scanner.resize(config.cache.document_capacity);
        if !self.registry_pinned {
            *self.registry.write().await = build_registry(&config);
        }
        *self.config.write().await = config;
    }

    fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
            completion_provider: Some(CompletionOptions {
                trigger_characters: Some(TRIGGER_CHARACTERS.iter().map(|c| c.to_string()).collect()),
                resolve_provider: Some(false),
                ..Default::default()
            }),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            code_lens_provider: Some(CodeLensOptions {
                resolve_provider: Some(false),
            }),
            ..Default::default()
        }
    }
}

impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        tracing::info!("initializing pyreq-lsp server");

        if let Some(options) = params.initialization_options {
            match parse_options(options) {
                Ok(config) => self.apply_config(config).await,
                Err(e) => tracing::warn!("ignoring initialization options: {}", e),
            }
        }

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: "pyreq-lsp".into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("pyreq-lsp server initialized");
        self.client
            .log_message(MessageType::INFO, "pyreq-lsp ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down pyreq-lsp server");
        self.state.scanner.clear();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        tracing::info!("document opened: {:?}", doc.uri);

        match self
            .state
            .open_document(doc.uri, Some(doc.language_id.as_str()), doc.version, doc.text)
        {
            Ok(kind) => tracing::debug!("tracking document as {:?}", kind),
            Err(e @ LspError::UnsupportedDocument { .. }) => tracing::debug!("{}", e),
            Err(e) => tracing::error!("failed to open document: {}", e),
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;

        // Full sync: the last change carries the whole document
        if let Some(change) = params.content_changes.into_iter().last()
            && let Err(e) = self
                .state
                .change_document(&uri, params.text_document.version, change.text)
        {
            tracing::debug!("ignoring change: {}", e);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::info!("document closed: {:?}", uri);
        self.state.close_document(&uri);
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        if !self.config.read().await.hover.enabled {
            return Ok(None);
        }
        Ok(hover::handle_hover(Arc::clone(&self.state), self.registry().await, params).await)
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        // Clone config before async call to release lock early
        let completion_config = { self.config.read().await.completion.clone() };
        if !completion_config.enabled {
            return Ok(None);
        }

        Ok(completion::handle_completion(
            Arc::clone(&self.state),
            self.registry().await,
            &completion_config,
            params,
        )
        .await)
    }

    async fn code_lens(&self, params: CodeLensParams) -> Result<Option<Vec<CodeLens>>> {
        if !self.config.read().await.code_lens.enabled {
            return Ok(None);
        }
        let lenses =
            code_lens::handle_code_lens(Arc::clone(&self.state), self.registry().await, params)
                .await;
        tracing::debug!("returning {} code lenses", lenses.len());
        Ok(Some(lenses))
    }
}
