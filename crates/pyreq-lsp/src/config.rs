use pyreq_pypi::registry::PYPI_BASE;
use serde::Deserialize;

/// Root configuration for the pyreq-lsp server.
///
/// This configuration can be provided by the LSP client via initialization options.
/// All fields use sensible defaults if not specified.
///
/// # Examples
///
/// ```
/// use pyreq_lsp::config::PyreqConfig;
///
/// let json = r#"{
///     "completion": { "include_prereleases": false, "max_items": 20 },
///     "code_lens": { "enabled": false }
/// }"#;
///
/// let config: PyreqConfig = serde_json::from_str(json).unwrap();
/// assert!(config.hover.enabled);
/// assert!(!config.code_lens.enabled);
/// assert_eq!(config.completion.max_items, 20);
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PyreqConfig {
    #[serde(default)]
    pub hover: HoverConfig,
    #[serde(default)]
    pub code_lens: CodeLensConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Configuration for package hovers.
#[derive(Debug, Clone, Deserialize)]
pub struct HoverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration for the "latest version" code lenses.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeLensConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CodeLensConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration for version completion.
///
/// # Defaults
///
/// - `enabled`: `true`
/// - `include_prereleases`: `true`
/// - `max_items`: `100`
///
/// # Examples
///
/// ```
/// use pyreq_lsp::config::CompletionConfig;
///
/// let config = CompletionConfig {
///     enabled: true,
///     include_prereleases: false,
///     max_items: 10,
/// };
///
/// assert!(!config.include_prereleases);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub include_prereleases: bool,
    /// Upper bound on offered versions, newest first.
    /// Values above 1000 are clamped.
    #[serde(
        default = "default_max_items",
        deserialize_with = "deserialize_max_items"
    )]
    pub max_items: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_prereleases: true,
            max_items: default_max_items(),
        }
    }
}

/// Configuration for the document scan cache and the HTTP cache.
///
/// # Defaults
///
/// - `document_capacity`: `200` documents
/// - `http_max_entries`: `1000` responses
/// - `http_timeout_secs`: `30`
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_document_capacity")]
    pub document_capacity: usize,
    #[serde(default = "default_http_max_entries")]
    pub http_max_entries: usize,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            document_capacity: default_document_capacity(),
            http_max_entries: default_http_max_entries(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

/// Package index settings.
///
/// `index_url` is the root of a PyPI-compatible JSON API. Only HTTPS roots
/// are accepted; anything else falls back to pypi.org.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_index_url", deserialize_with = "deserialize_index_url")]
    pub index_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
        }
    }
}

// Default value functions
const fn default_true() -> bool {
    true
}

const fn default_max_items() -> usize {
    100
}

const fn default_document_capacity() -> usize {
    pyreq_pypi::scanner::DEFAULT_CAPACITY
}

const fn default_http_max_entries() -> usize {
    pyreq_core::cache::DEFAULT_MAX_ENTRIES
}

const fn default_http_timeout() -> u64 {
    30
}

fn default_index_url() -> String {
    PYPI_BASE.to_string()
}

/// Maximum number of completion items (protects slow clients)
const MAX_COMPLETION_ITEMS: usize = 1000;

fn deserialize_max_items<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = usize::deserialize(deserializer)?;
    if value > MAX_COMPLETION_ITEMS {
        tracing::warn!(
            "completion.max_items {} exceeds {}, clamping",
            value,
            MAX_COMPLETION_ITEMS
        );
        return Ok(MAX_COMPLETION_ITEMS);
    }
    Ok(value)
}

fn validate_index_url(url: String) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        tracing::warn!("ignoring non-HTTPS index_url {:?}, using {}", url, PYPI_BASE);
        default_index_url()
    }
}

fn deserialize_index_url<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let url = String::deserialize(deserializer)?;
    Ok(validate_index_url(url))
}
