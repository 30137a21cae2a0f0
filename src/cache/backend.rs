//! Cache backend implementations.

use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// A key → bytes store. Absence is reported as `None`, never as an error.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Bytes>;
    async fn set(&self, key: &str, value: Bytes);
    async fn delete(&self, key: &str);
    fn name(&self) -> &'static str;
}

/// Streaming access on top of [`Cache`].
///
/// The provided methods buffer the whole value in memory, which is what the
/// in-memory backends want. Backends that can stream (see
/// [`DiskCache`](super::DiskCache)) override them.
#[async_trait]
pub trait StreamCache: Cache {
    /// Returns [`Error::NotFound`] on a miss.
    async fn get_reader(&self, key: &str) -> Result<BoxStream<'static, Bytes>> {
        match self.get(key).await {
            Some(data) => Ok(Box::pin(futures::stream::once(async move { Ok::<_, Error>(data) }))),
            None => Err(Error::not_found(key)),
        }
    }

    /// Drains `stream` into the entry for `key`. Nothing is stored if the
    /// stream fails part way.
    async fn set_reader(&self, key: &str, mut stream: BoxStream<'static, Bytes>) -> Result<()> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        self.set(key, buf.freeze()).await;
        Ok(())
    }
}

/// Unbounded in-memory cache guarded by a single mutex.
#[derive(Default)]
pub struct MemoryCache {
    items: Mutex<HashMap<String, Bytes>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, HashMap<String, Bytes>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items().contains_key(key)
    }

    pub fn clear(&self) {
        self.items().clear();
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Bytes> {
        self.items().get(key).cloned()
    }
    async fn set(&self, key: &str, value: Bytes) {
        self.items().insert(key.to_string(), value);
    }
    async fn delete(&self, key: &str) {
        self.items().remove(key);
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

impl StreamCache for MemoryCache {}

/// In-memory cache holding at most `capacity` entries, evicting the least
/// recently used one.
///
/// Header and body records are separate entries, so one cached response
/// occupies two slots. An evicted body makes its header unusable, which the
/// transport treats as a miss.
pub struct LruMemoryCache {
    items: Mutex<LruCache<String, Bytes>>,
}

impl LruMemoryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            items: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn items(&self) -> MutexGuard<'_, LruCache<String, Bytes>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items().cap().get()
    }
}

#[async_trait]
impl Cache for LruMemoryCache {
    async fn get(&self, key: &str) -> Option<Bytes> {
        self.items().get(key).cloned()
    }
    async fn set(&self, key: &str, value: Bytes) {
        self.items().put(key.to_string(), value);
    }
    async fn delete(&self, key: &str) {
        self.items().pop(key);
    }
    fn name(&self) -> &'static str {
        "lru-memory"
    }
}

impl StreamCache for LruMemoryCache {}
