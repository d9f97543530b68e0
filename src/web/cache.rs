//! Instance-owned TTL caches for search and scrape results.
//!
//! Each engine handle owns its caches; there are no process-wide
//! singletons. The caching wrappers implement the collaborator traits,
//! so the rest of the engine is unaware of caching entirely.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    ScrapeOptions, ScrapedPage, SearchOptions, SearchProvider, SearchResponse, Scraper,
};
use crate::error::ResearchError;

/// A bounded map whose entries expire after a fixed time-to-live.
///
/// Eviction is two-stage: expired entries are removed on access, and
/// when the map is full the stalest entry makes room for the new one.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, (Instant, V)>,
    capacity: usize,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// Creates a cache holding at most `capacity` live entries.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(64)),
            capacity,
            ttl,
        }
    }

    /// Returns a clone of the cached value if present and unexpired.
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.entries.get(key) {
            Some((stored, value)) if stored.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts a value, evicting the stalest entry when at capacity.
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let ttl = self.ttl;
        self.entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(stalest) = self
                .entries
                .iter()
                .min_by_key(|(_, (stored, _))| *stored)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&stalest);
            }
        }
        self.entries.insert(key, (Instant::now(), value));
    }

    /// Number of entries currently stored (including expired ones not
    /// yet swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Search backend wrapper that serves repeated queries from a TTL cache.
pub struct CachedSearch {
    inner: Arc<dyn SearchProvider>,
    cache: Mutex<TtlCache<String, SearchResponse>>,
}

impl CachedSearch {
    /// Wraps a search backend with an instance-owned cache.
    #[must_use]
    pub fn new(inner: Arc<dyn SearchProvider>, capacity: usize, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Mutex::new(TtlCache::new(capacity, ttl)),
        }
    }

    fn cache_key(query: &str, options: &SearchOptions) -> String {
        format!("{}|{}|{query}", options.search_type, options.max_results)
    }
}

impl std::fmt::Debug for CachedSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSearch")
            .field("inner", &self.inner.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SearchProvider for CachedSearch {
    fn name(&self) -> &'static str {
        "cached-search"
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse, ResearchError> {
        if !options.cache {
            return self.inner.search(query, options).await;
        }

        let key = Self::cache_key(query, options);
        if let Some(hit) = self.cache.lock().await.get(&key) {
            debug!(query, "search cache hit");
            return Ok(hit);
        }

        let response = self.inner.search(query, options).await?;
        self.cache.lock().await.insert(key, response.clone());
        Ok(response)
    }
}

/// Scrape backend wrapper that serves repeated URLs from a TTL cache.
pub struct CachedScraper {
    inner: Arc<dyn Scraper>,
    cache: Mutex<TtlCache<String, ScrapedPage>>,
}

impl CachedScraper {
    /// Wraps a scrape backend with an instance-owned cache.
    #[must_use]
    pub fn new(inner: Arc<dyn Scraper>, capacity: usize, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Mutex::new(TtlCache::new(capacity, ttl)),
        }
    }
}

impl std::fmt::Debug for CachedScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedScraper")
            .field("inner", &self.inner.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Scraper for CachedScraper {
    fn name(&self) -> &'static str {
        "cached-scraper"
    }

    async fn scrape(
        &self,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<ScrapedPage, ResearchError> {
        if !options.cache {
            return self.inner.scrape(url, options).await;
        }

        let key = url.to_string();
        if let Some(hit) = self.cache.lock().await.get(&key) {
            debug!(url, "scrape cache hit");
            return Ok(hit);
        }

        let page = self.inner.scrape(url, options).await?;
        self.cache.lock().await.insert(key, page.clone());
        Ok(page)
    }
}
