//! # Byte Cache Module
//!
//! Pluggable key → bytes stores used by [`CachingTransport`](crate::transport::CachingTransport)
//! to keep response heads and bodies.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Cache`] | Get / set / delete contract; a miss is `None`, never an error |
//! | [`StreamCache`] | Streaming variant; a miss is [`Error::NotFound`](crate::Error::NotFound) |
//! | [`MemoryCache`] | Unbounded map behind one mutex |
//! | [`LruMemoryCache`] | Bounded map with least-recently-used eviction |
//! | [`DiskCache`] | One file per key, written atomically |
//! | [`CacheKey`] | `header-<METHOD>-<URL>` / `body-<METHOD>-<URL>` key pair |
//!
//! ## Example
//!
//! ```rust
//! use httpcache::cache::{Cache, MemoryCache};
//! use bytes::Bytes;
//!
//! # tokio_test::block_on(async {
//! let cache = MemoryCache::new();
//! cache.set("greeting", Bytes::from_static(b"hello")).await;
//! assert_eq!(cache.get("greeting").await, Some(Bytes::from_static(b"hello")));
//! # });
//! ```
//!
//! No backend locks per key. Two concurrent writers for the same key race and
//! the last `set` wins.

mod backend;
mod disk;
mod key;

pub use backend::{Cache, LruMemoryCache, MemoryCache, StreamCache};
pub use disk::DiskCache;
pub use key::{hashed_key, CacheKey};
