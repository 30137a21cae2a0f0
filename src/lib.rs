//! # httpcache
//!
//! A private HTTP cache (RFC 7234) packaged as a transport decorator.
//!
//! ## Overview
//!
//! [`CachingTransport`] wraps any [`Transport`] and keeps responses to GET and
//! HEAD requests in a pluggable byte store. Fresh responses are served with no
//! network I/O, stale ones are revalidated with `If-None-Match` /
//! `If-Modified-Since`, and `stale-if-error` (RFC 5861) lets a stored response
//! mask a failed fetch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use httpcache::{CachingTransport, HttpTransport, Transport};
//! use reqwest::{Method, Request, Url};
//!
//! #[tokio::main]
//! async fn main() -> httpcache::Result<()> {
//!     let transport = CachingTransport::with_memory_cache(HttpTransport::from_env()?);
//!
//!     let url = Url::parse("https://example.com/").expect("valid url");
//!     let resp = transport.round_trip(Request::new(Method::GET, url.clone())).await?;
//!     let _ = resp.bytes().await?; // the body is stored once it has been read
//!
//!     let again = transport.round_trip(Request::new(Method::GET, url)).await?;
//!     println!("served from cache: {}", again.is_from_cache());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Byte stores: memory, bounded LRU, disk |
//! | [`freshness`] | Cache-Control parsing and freshness classification |
//! | [`headers`] | Vary matching and end-to-end header merging |
//! | [`transport`] | Transport contract, reqwest transport, caching decorator |

pub mod cache;
pub mod freshness;
pub mod headers;
pub mod transport;

pub use cache::{Cache, DiskCache, LruMemoryCache, MemoryCache, StreamCache};
pub use freshness::{Clock, Freshness, ManualClock, SystemClock};
pub use transport::{
    Body, CacheConfig, CacheStats, CachingTransport, HttpTransport, HttpTransportConfig, Response,
    Transport, TransportError,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
