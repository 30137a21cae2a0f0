//! httpcache-fetch: fetch a URL twice through the cache and report what happened.
//!
//! Usage:
//!   httpcache-fetch <url>
//!
//! ENVIRONMENT:
//!   HTTPCACHE_URL     URL to fetch when no argument is given
//!   HTTPCACHE_DIR     Store entries on disk under this directory (memory otherwise)
//!   RUST_LOG          Log filter, e.g. `httpcache=debug`

use httpcache::{
    Cache, CacheConfig, CachingTransport, DiskCache, HttpTransport, MemoryCache, StreamCache,
    Transport,
};
use reqwest::{Method, Request, Url};
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .with_target(false)
        .try_init();

    let Some(raw_url) = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HTTPCACHE_URL").ok())
    else {
        eprintln!("usage: httpcache-fetch <url>  (or set HTTPCACHE_URL)");
        std::process::exit(2);
    };
    let url = Url::parse(&raw_url)?;

    let cache: Arc<dyn StreamCache> = match std::env::var("HTTPCACHE_DIR") {
        Ok(dir) if !dir.is_empty() => Arc::new(DiskCache::new(dir)),
        _ => Arc::new(MemoryCache::new()),
    };
    println!("cache backend: {}", cache.name());

    let transport = CachingTransport::new(HttpTransport::from_env()?, cache)
        .with_config(CacheConfig::from_env());

    for attempt in 1..=2 {
        let started = Instant::now();
        let resp = transport
            .round_trip(Request::new(Method::GET, url.clone()))
            .await?;
        let status = resp.status;
        let from_cache = resp.is_from_cache();
        let body = resp.bytes().await?;
        println!(
            "#{attempt} {status} {} bytes in {:?}{}",
            body.len(),
            started.elapsed(),
            if from_cache { " (from cache)" } else { "" }
        );
    }

    let stats = transport.stats();
    println!(
        "hits={} misses={} revalidations={} stale_served={} stores={}",
        stats.hits, stats.misses, stats.revalidations, stats.stale_served, stats.stores
    );
    Ok(())
}
