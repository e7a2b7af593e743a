use crate::error::{PyreqError, Result};
use dashmap::DashMap;
use reqwest::{Client, Response, StatusCode, header};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default bound on cached responses.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Validates that a URL uses HTTPS.
///
/// In test mode, HTTP URLs are allowed for mockito compatibility.
#[inline]
fn ensure_https(url: &str) -> Result<()> {
    #[cfg(not(test))]
    if !url.starts_with("https://") {
        return Err(PyreqError::InsecureUrl(url.to_string()));
    }
    #[cfg(test)]
    let _ = url;
    Ok(())
}

/// Settings for [`HttpCache`].
///
/// # Examples
///
/// ```
/// use pyreq_core::cache::HttpCacheConfig;
/// use std::time::Duration;
///
/// let config = HttpCacheConfig {
///     max_entries: 50,
///     timeout: Duration::from_secs(5),
///     ..Default::default()
/// };
/// assert_eq!(config.max_entries, 50);
/// assert!(config.user_agent.starts_with("pyreq-lsp/"));
/// ```
#[derive(Debug, Clone)]
pub struct HttpCacheConfig {
    pub max_entries: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            timeout: Duration::from_secs(30),
            user_agent: concat!("pyreq-lsp/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Cached HTTP response with validation headers.
///
/// The body is wrapped in `Arc` so every consumer of a registry document
/// shares one buffer.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: Arc<Vec<u8>>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub fetched_at: Instant,
}

impl CachedResponse {
    fn from_parts(headers: &header::HeaderMap, body: Arc<Vec<u8>>) -> Self {
        let header_value = |name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };

        Self {
            body,
            etag: header_value(header::ETAG),
            last_modified: header_value(header::LAST_MODIFIED),
            fetched_at: Instant::now(),
        }
    }
}

/// HTTP cache with ETag and Last-Modified validation.
///
/// Registry documents are fetched once and revalidated on later requests
/// with `If-None-Match` / `If-Modified-Since`. A transport failure during
/// revalidation serves the stale body; a non-success status drops the entry
/// and is reported as [`PyreqError::HttpStatus`].
///
/// The cache is an explicitly owned object. Callers share it through an
/// `Arc` and reset it with [`HttpCache::clear`].
///
/// # Examples
///
/// ```no_run
/// use pyreq_core::cache::HttpCache;
///
/// # async fn example() -> pyreq_core::error::Result<()> {
/// let cache = HttpCache::new();
/// let first = cache.get_cached("https://pypi.org/pypi/requests/json").await?;
/// let second = cache.get_cached("https://pypi.org/pypi/requests/json").await?;
/// assert_eq!(first.len(), second.len());
/// # Ok(())
/// # }
/// ```
pub struct HttpCache {
    entries: DashMap<String, CachedResponse>,
    client: Client,
    max_entries: usize,
}

impl HttpCache {
    /// Creates a cache with [`HttpCacheConfig::default`].
    pub fn new() -> Self {
        Self::with_config(HttpCacheConfig::default())
    }

    /// Creates a cache with explicit limits and client settings.
    pub fn with_config(config: HttpCacheConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to configure HTTP client, using defaults");
                Client::new()
            });

        Self {
            entries: DashMap::new(),
            client,
            max_entries: config.max_entries.max(1),
        }
    }

    /// Retrieves the body at `url`, revalidating a cached copy when present.
    ///
    /// # Errors
    ///
    /// - [`PyreqError::HttpStatus`] when the server answers with a non-success status
    /// - [`PyreqError::Transport`] when nothing is cached and the request fails
    pub async fn get_cached(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        if self.entries.len() >= self.max_entries {
            self.evict_entries();
        }

        let cached = self.entries.get(url).map(|entry| entry.value().clone());
        let Some(cached) = cached else {
            return self.fetch_and_store(url).await;
        };

        match self.conditional_request(url, &cached).await {
            Ok(Some(new_body)) => Ok(new_body),
            Ok(None) => Ok(cached.body),
            Err(e @ PyreqError::HttpStatus { .. }) => {
                self.entries.remove(url);
                Err(e)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "revalidation failed, serving cached body");
                Ok(cached.body)
            }
        }
    }

    /// Sends a conditional GET.
    ///
    /// Returns `Ok(None)` on 304 Not Modified and the fresh body otherwise.
    async fn conditional_request(
        &self,
        url: &str,
        cached: &CachedResponse,
    ) -> Result<Option<Arc<Vec<u8>>>> {
        ensure_https(url)?;
        let mut request = self.client.get(url);

        if let Some(etag) = &cached.etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &cached.last_modified {
            request = request.header(header::IF_MODIFIED_SINCE, last_modified);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(None);
        }

        self.store(url, response).await.map(Some)
    }

    /// Fetches `url` unconditionally and stores the response.
    pub(crate) async fn fetch_and_store(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        ensure_https(url)?;
        tracing::debug!(url, "fetching fresh");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        self.store(url, response).await
    }

    async fn store(&self, url: &str, response: Response) -> Result<Arc<Vec<u8>>> {
        let status = response.status();
        if !status.is_success() {
            return Err(PyreqError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, e))?;
        let body = Arc::new(body.to_vec());

        self.entries.insert(
            url.to_string(),
            CachedResponse::from_parts(&headers, Arc::clone(&body)),
        );

        Ok(body)
    }

    /// Drops the cached response for `url`, if any.
    pub fn invalidate(&self, url: &str) {
        self.entries.remove(url);
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts the oldest tenth of the entries.
    fn evict_entries(&self) {
        let target_removals = (self.max_entries / 10).max(1);

        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().fetched_at))
            .collect();
        by_age.sort_by_key(|(_, fetched_at)| *fetched_at);

        for (url, _) in by_age.iter().take(target_removals) {
            self.entries.remove(url);
        }

        tracing::debug!(removed = target_removals.min(by_age.len()), "evicted cache entries");
    }
}

impl Default for HttpCache {
    fn default() -> Self {
        Self::new()
    }
}

fn transport_error(url: &str, source: reqwest::Error) -> PyreqError {
    PyreqError::Transport {
        url: url.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &[u8], etag: Option<&str>) -> CachedResponse {
        CachedResponse {
            body: Arc::new(body.to_vec()),
            etag: etag.map(String::from),
            last_modified: None,
            fetched_at: Instant::now(),
        }
    }

    #[test]
    fn test_cache_creation() {
        let cache = HttpCache::new();
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_clear_and_invalidate() {
        let cache = HttpCache::new();
        cache.entries.insert("a".into(), response(b"1", None));
        cache.entries.insert("b".into(), response(b"2", None));

        cache.invalidate("a");
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_removes_oldest() {
        let cache = HttpCache::with_config(HttpCacheConfig {
            max_entries: 10,
            ..Default::default()
        });
        for i in 0..10 {
            cache
                .entries
                .insert(format!("url{i}"), response(b"x", None));
        }

        cache.evict_entries();

        assert_eq!(cache.len(), 9);
        assert!(!cache.entries.contains_key("url0"));
        assert!(cache.entries.contains_key("url9"));
    }

    #[tokio::test]
    async fn test_get_cached_fresh_fetch() {
        let mut server = mockito::Server::new_async().await;

        let _m = server
            .mock("GET", "/pypi/requests/json")
            .with_status(200)
            .with_header("etag", "\"abc123\"")
            .with_body("{}")
            .create_async()
            .await;

        let cache = HttpCache::new();
        let url = format!("{}/pypi/requests/json", server.url());
        let result = cache.get_cached(&url).await.unwrap();

        assert_eq!(&**result, b"{}");
        assert_eq!(cache.len(), 1);
        let cached = cache.entries.get(&url).unwrap();
        assert_eq!(cached.etag.as_deref(), Some("\"abc123\""));
    }

    #[tokio::test]
    async fn test_get_cached_304_not_modified() {
        let mut server = mockito::Server::new_async().await;
        let url = format!("{}/pypi/flask/json", server.url());
        let cache = HttpCache::new();
        cache
            .entries
            .insert(url.clone(), response(b"cached", Some("\"tag123\"")));

        let _m = server
            .mock("GET", "/pypi/flask/json")
            .match_header("if-none-match", "\"tag123\"")
            .with_status(304)
            .create_async()
            .await;

        let result = cache.get_cached(&url).await.unwrap();
        assert_eq!(&**result, b"cached");
    }

    #[tokio::test]
    async fn test_get_cached_last_modified_validation() {
        let mut server = mockito::Server::new_async().await;
        let url = format!("{}/pypi/flask/json", server.url());
        let cache = HttpCache::new();
        cache.entries.insert(
            url.clone(),
            CachedResponse {
                last_modified: Some("Wed, 21 Oct 2024 07:28:00 GMT".into()),
                ..response(b"cached", None)
            },
        );

        let _m = server
            .mock("GET", "/pypi/flask/json")
            .match_header("if-modified-since", "Wed, 21 Oct 2024 07:28:00 GMT")
            .with_status(304)
            .create_async()
            .await;

        let result = cache.get_cached(&url).await.unwrap();
        assert_eq!(&**result, b"cached");
    }

    #[tokio::test]
    async fn test_get_cached_changed_content_replaces_entry() {
        let mut server = mockito::Server::new_async().await;
        let url = format!("{}/pypi/flask/json", server.url());
        let cache = HttpCache::new();
        cache
            .entries
            .insert(url.clone(), response(b"old", Some("\"v1\"")));

        let _m = server
            .mock("GET", "/pypi/flask/json")
            .with_status(200)
            .with_header("etag", "\"v2\"")
            .with_body("new")
            .create_async()
            .await;

        let result = cache.get_cached(&url).await.unwrap();
        assert_eq!(&**result, b"new");
        assert_eq!(
            cache.entries.get(&url).unwrap().etag.as_deref(),
            Some("\"v2\"")
        );
    }

    #[tokio::test]
    async fn test_get_cached_network_error_fallback() {
        let cache = HttpCache::new();
        let url = "http://invalid.localhost.test/pypi/x/json";
        cache
            .entries
            .insert(url.to_string(), response(b"stale data", Some("\"old\"")));

        let result = cache.get_cached(url).await.unwrap();
        assert_eq!(&**result, b"stale data");
    }

    #[tokio::test]
    async fn test_not_found_status_is_reported() {
        let mut server = mockito::Server::new_async().await;

        let _m = server
            .mock("GET", "/pypi/missing/json")
            .with_status(404)
            .with_body("Not Found")
            .create_async()
            .await;

        let cache = HttpCache::new();
        let url = format!("{}/pypi/missing/json", server.url());
        let err = cache.get_cached(&url).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_status_error_during_revalidation_drops_entry() {
        let mut server = mockito::Server::new_async().await;
        let url = format!("{}/pypi/gone/json", server.url());
        let cache = HttpCache::new();
        cache
            .entries
            .insert(url.clone(), response(b"old", Some("\"v1\"")));

        let _m = server
            .mock("GET", "/pypi/gone/json")
            .with_status(404)
            .create_async()
            .await;

        let err = cache.get_cached(&url).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.is_empty());
    }
}
