//! The caching round-tripper.

use super::body::tee_into_cache;
use super::entry::StoredHead;
use super::{Body, Response, Transport};
use crate::cache::{CacheKey, MemoryCache, StreamCache};
use crate::freshness::{
    can_stale_on_error, freshness, CacheControl, Clock, Freshness, SystemClock,
};
use crate::headers::{merge_end_to_end, record_varied, vary_matches, X_FROM_CACHE};
use crate::Result;
use bytes::Bytes;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
    RANGE,
};
use reqwest::{Method, StatusCode};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Add `X-From-Cache: 1` to responses served from the cache.
    pub mark_cached_responses: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mark_cached_responses: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `HTTPCACHE_MARK_CACHED_RESPONSES` (`0`/`false` to disable).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("HTTPCACHE_MARK_CACHED_RESPONSES") {
            cfg.mark_cached_responses = !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        cfg
    }

    pub fn with_mark_cached_responses(mut self, mark: bool) -> Self {
        self.mark_cached_responses = mark;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fresh responses served without touching the network.
    pub hits: u64,
    /// Cacheable requests that could not be answered from the cache alone.
    pub misses: u64,
    /// Stale responses confirmed by a 304.
    pub revalidations: u64,
    /// Stored responses served in place of a failed fetch.
    pub stale_served: u64,
    /// Response heads written to the cache.
    pub stores: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    revalidations: AtomicU64,
    stale_served: AtomicU64,
    stores: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            revalidations: self.revalidations.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
        }
    }
}

/// A [`Transport`] that answers from, revalidates against and fills a
/// [`StreamCache`] before falling through to the wrapped transport.
///
/// Only GET and HEAD requests without a `Range` header are cached. There is
/// no single-flight: concurrent misses for the same URL all reach the network
/// and the last one to finish owns the entry.
pub struct CachingTransport {
    inner: Arc<dyn Transport>,
    cache: Arc<dyn StreamCache>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    stats: AtomicStats,
}

impl CachingTransport {
    pub fn new(inner: impl Transport + 'static, cache: Arc<dyn StreamCache>) -> Self {
        Self {
            inner: Arc::new(inner),
            cache,
            clock: Arc::new(SystemClock),
            config: CacheConfig::default(),
            stats: AtomicStats::default(),
        }
    }

    /// Wraps `inner` with a fresh unbounded in-memory cache.
    pub fn with_memory_cache(inner: impl Transport + 'static) -> Self {
        Self::new(inner, Arc::new(MemoryCache::new()))
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &Arc<dyn StreamCache> {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    /// The stored response for `req`, if both its head and body are present.
    /// A malformed stored head is an error.
    pub async fn cached_response(&self, req: &reqwest::Request) -> Result<Option<Response>> {
        self.lookup(&CacheKey::for_request(req)).await
    }

    async fn lookup(&self, key: &CacheKey) -> Result<Option<Response>> {
        let Some(raw) = self.cache.get(&key.header()).await else {
            return Ok(None);
        };
        let head = StoredHead::decode(&raw)?;
        let body = match self.cache.get_reader(&key.body()).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        head.into_response(Body::from_stream(body)).map(Some)
    }

    async fn purge(&self, key: &CacheKey) {
        self.cache.delete(&key.header()).await;
        self.cache.delete(&key.body()).await;
    }

    fn mark(&self, resp: &mut Response) {
        if self.config.mark_cached_responses {
            resp.headers
                .insert(
                HeaderName::from_static(X_FROM_CACHE),
                HeaderValue::from_static("1"),
            );
        }
    }

    /// Persists `resp` for `req_headers` and returns it with its body teed
    /// into the cache.
    async fn store(
        &self,
        key: &CacheKey,
        method: &Method,
        req_headers: &HeaderMap,
        mut resp: Response,
    ) -> Result<Response> {
        self.purge(key).await;
        record_varied(&mut resp.headers, req_headers);
        let head = StoredHead::from_response(&resp).encode()?;
        self.cache.set(&key.header(), head).await;
        self.stats.stores.fetch_add(1, Ordering::Relaxed);

        if *method == Method::HEAD {
            self.cache.set(&key.body(), Bytes::new()).await;
            return Ok(resp);
        }
        let body = std::mem::replace(&mut resp.body, Body::empty());
        resp.body = tee_into_cache(body, self.cache.clone(), key.body());
        Ok(resp)
    }
}

fn is_cacheable(req: &reqwest::Request) -> bool {
    (req.method() == Method::GET || req.method() == Method::HEAD)
        && !req.headers().contains_key(RANGE)
}

fn can_store(req_cc: &CacheControl, resp_cc: &CacheControl) -> bool {
    !req_cc.contains("no-store") && !resp_cc.contains("no-store")
}

/// Adds `If-None-Match` / `If-Modified-Since` from the stored validators
/// unless the request already carries them.
fn add_validators(req_headers: &mut HeaderMap, cached: &HeaderMap) {
    if let Some(etag) = cached.get(ETAG) {
        if !req_headers.contains_key(IF_NONE_MATCH) {
            req_headers.insert(IF_NONE_MATCH, etag.clone());
        }
    }
    if let Some(last_modified) = cached.get(LAST_MODIFIED) {
        if !req_headers.contains_key(IF_MODIFIED_SINCE) {
            req_headers.insert(IF_MODIFIED_SINCE, last_modified.clone());
        }
    }
}

#[async_trait::async_trait]
impl Transport for CachingTransport {
    async fn round_trip(&self, mut req: reqwest::Request) -> Result<Response> {
        let key = CacheKey::for_request(&req);

        if !is_cacheable(&req) {
            debug!(key = %key, "uncacheable request");
            self.purge(&key).await;
            return self.inner.round_trip(req).await;
        }

        let method = req.method().clone();
        let req_headers = req.headers().clone();
        let req_cc = CacheControl::parse(&req_headers);

        let cached = match self.lookup(&key).await {
            Ok(Some(cached)) if vary_matches(&cached.headers, &req_headers) => Some(cached),
            Ok(Some(_)) => {
                debug!(key = %key, "stored response varies from request");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "dropping unreadable cache entry");
                self.purge(&key).await;
                None
            }
        };

        let resp = match cached {
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                if req_cc.contains("only-if-cached") {
                    debug!(key = %key, "only-if-cached miss");
                    return Ok(Response::gateway_timeout());
                }
                self.inner.round_trip(req).await?
            }
            Some(mut cached) => {
                self.mark(&mut cached);
                match freshness(&cached.headers, &req_headers, self.clock.as_ref()) {
                    Freshness::Fresh => {
                        debug!(key = %key, "fresh cache hit");
                        self.stats.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(cached);
                    }
                    Freshness::Stale => {
                        debug!(key = %key, "revalidating stale entry");
                        add_validators(req.headers_mut(), &cached.headers);
                    }
                    Freshness::Transparent => {
                        debug!(key = %key, "request bypasses stored entry");
                    }
                }
                self.stats.misses.fetch_add(1, Ordering::Relaxed);

                match self.inner.round_trip(req).await {
                    Ok(resp)
                        if resp.status == StatusCode::NOT_MODIFIED && method == Method::GET =>
                    {
                        debug!(key = %key, "stored entry revalidated");
                        self.stats.revalidations.fetch_add(1, Ordering::Relaxed);
                        merge_end_to_end(&mut cached.headers, &resp.headers);
                        cached
                    }
                    Ok(resp)
                        if resp.status.is_server_error()
                            && can_stale_on_error(
                                &cached.headers,
                                &req_headers,
                                self.clock.as_ref(),
                            ) =>
                    {
                        debug!(
                            key = %key,
                            status = %resp.status,
                            "serving stale entry for server error"
                        );
                        self.stats.stale_served.fetch_add(1, Ordering::Relaxed);
                        return Ok(cached);
                    }
                    Ok(resp) => resp,
                    Err(e) => {
                        if can_stale_on_error(&cached.headers, &req_headers, self.clock.as_ref()) {
                            debug!(
                                key = %key,
                                error = %e,
                                "serving stale entry for transport error"
                            );
                            self.stats.stale_served.fetch_add(1, Ordering::Relaxed);
                            return Ok(cached);
                        }
                        self.purge(&key).await;
                        return Err(e);
                    }
                }
            }
        };

        // Error responses are never cached and evict whatever was stored.
        if resp.status != StatusCode::OK {
            self.purge(&key).await;
            return Ok(resp);
        }
        if !can_store(&req_cc, &CacheControl::parse(&resp.headers)) {
            debug!(key = %key, "no-store");
            self.purge(&key).await;
            return Ok(resp);
        }
        self.store(&key, &method, &req_headers, resp).await
    }
}
