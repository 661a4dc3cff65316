//! Cache API: named cache generations of request → response snapshots.

use async_trait::async_trait;
use futures::future::try_join_all;
use http::Method;
use offline_net::{Fetcher, Request, Response};
use tokio::sync::RwLock;
use tracing::{debug, trace};
use url::Url;

use crate::ServiceWorkerError;

/// Identity under which a response is cached: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: Method,
    pub url: String,
}

impl RequestKey {
    /// Key for a request.
    pub fn from_request(request: &Request) -> Self {
        Self::new(request.method.clone(), &request.url)
    }

    /// Key for a GET of `url`.
    pub fn get(url: &Url) -> Self {
        Self::new(Method::GET, url)
    }

    fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method,
            url: url.into(),
        }
    }
}

/// A cached request/response pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request identity.
    pub key: RequestKey,

    /// Response snapshot, replayed verbatim.
    pub response: Response,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

/// A single cache generation.
#[derive(Debug, Default, Clone)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    /// Cached entries, in insertion order.
    entries: Vec<CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    /// Match a request.
    pub fn match_request(&self, key: &RequestKey) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    /// Store an entry, replacing any entry with the same key.
    pub fn put(&mut self, key: RequestKey, response: Response) {
        let entry = CacheEntry {
            key,
            response,
            cached_at: now_millis(),
        };
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Delete entry.
    pub fn delete(&mut self, key: &RequestKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.key != key);
        self.entries.len() != before
    }

    /// Get all keys.
    pub fn keys(&self) -> Vec<&RequestKey> {
        self.entries.iter().map(|e| &e.key).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache store capability.
///
/// Generations are addressed by name; lookups by request identity search every
/// generation in creation order.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a generation, creating it if absent.
    async fn open(&self, name: &str) -> Result<(), ServiceWorkerError>;

    /// Store a response in an open generation.
    async fn put(
        &self,
        name: &str,
        request: &Request,
        response: Response,
    ) -> Result<(), ServiceWorkerError>;

    /// Find a cached response for a request in any generation.
    async fn match_request(&self, request: &Request) -> Option<Response>;

    /// Names of all generations.
    async fn keys(&self) -> Vec<String>;

    /// Delete a generation. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, ServiceWorkerError>;

    /// Fetch every request and store the responses in `name`.
    ///
    /// Nothing is stored unless every fetch succeeds with a 2xx status.
    async fn add_all(
        &self,
        name: &str,
        requests: Vec<Request>,
        fetcher: &dyn Fetcher,
    ) -> Result<usize, ServiceWorkerError> {
        let fetches = requests.into_iter().map(|request| async move {
            let url = request.url.clone();
            let response = fetcher
                .fetch(request.clone())
                .await
                .map_err(|e| ServiceWorkerError::CacheError(format!("{}: {}", url, e)))?;
            if !response.ok() {
                return Err(ServiceWorkerError::CacheError(format!(
                    "{}: bad response status {}",
                    url, response.status
                )));
            }
            Ok::<_, ServiceWorkerError>((request, response))
        });
        let fetched = try_join_all(fetches).await?;

        let count = fetched.len();
        for (request, response) in fetched {
            self.put(name, &request, response).await?;
        }
        Ok(count)
    }
}

/// In-memory cache storage.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: RwLock<Vec<Cache>>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a generation exists.
    pub async fn has(&self, name: &str) -> bool {
        self.caches.read().await.iter().any(|c| c.name == name)
    }

    /// Snapshot of one generation.
    pub async fn get(&self, name: &str) -> Option<Cache> {
        self.caches
            .read()
            .await
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    /// Total number of entries across all generations.
    pub async fn entry_count(&self) -> usize {
        self.caches.read().await.iter().map(Cache::len).sum()
    }
}

#[async_trait]
impl CacheStore for CacheStorage {
    async fn open(&self, name: &str) -> Result<(), ServiceWorkerError> {
        let mut caches = self.caches.write().await;
        if !caches.iter().any(|c| c.name == name) {
            debug!(cache = name, "Creating cache");
            caches.push(Cache::new(name));
        }
        Ok(())
    }

    async fn put(
        &self,
        name: &str,
        request: &Request,
        response: Response,
    ) -> Result<(), ServiceWorkerError> {
        let mut caches = self.caches.write().await;
        let cache = caches
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| ServiceWorkerError::NotFound(format!("cache {}", name)))?;
        trace!(cache = name, url = %request.url, "Caching response");
        cache.put(RequestKey::from_request(request), response);
        Ok(())
    }

    async fn match_request(&self, request: &Request) -> Option<Response> {
        let key = RequestKey::from_request(request);
        let caches = self.caches.read().await;
        caches
            .iter()
            .find_map(|cache| cache.match_request(&key))
            .map(|entry| entry.response.clone())
    }

    async fn keys(&self) -> Vec<String> {
        self.caches
            .read()
            .await
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    async fn delete(&self, name: &str) -> Result<bool, ServiceWorkerError> {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|c| c.name != name);
        Ok(caches.len() != before)
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
