//! Basic usage: wrap the network transport with an in-memory LRU cache.
//!
//! Usage:
//!   cargo run --example basic_usage -- https://httpbin.org/cache/60

use httpcache::{CachingTransport, HttpTransport, LruMemoryCache, Transport};
use reqwest::{Method, Request, Url};
use std::num::NonZeroUsize;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/cache/60".to_string());
    let url = Url::parse(&url)?;

    let capacity = NonZeroUsize::new(256).ok_or("capacity must be non-zero")?;
    let transport = CachingTransport::new(
        HttpTransport::from_env()?,
        Arc::new(LruMemoryCache::new(capacity)),
    );

    let first = transport
        .round_trip(Request::new(Method::GET, url.clone()))
        .await?;
    println!("first:  {} cached={}", first.status, first.is_from_cache());
    // The entry is only complete once the body has been read to the end.
    let _ = first.bytes().await?;

    let second = transport.round_trip(Request::new(Method::GET, url)).await?;
    println!("second: {} cached={}", second.status, second.is_from_cache());
    println!("{}", second.text().await?);

    println!("{:?}", transport.stats());
    Ok(())
}
