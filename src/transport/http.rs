use super::{Body, Response, Transport, TransportError};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Proxy;
use std::env;
use std::time::Duration;

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub proxy_url: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            proxy_url: None,
        }
    }
}

impl HttpTransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `HTTPCACHE_HTTP_TIMEOUT_SECS`,
    /// `HTTPCACHE_HTTP_POOL_MAX_IDLE_PER_HOST`,
    /// `HTTPCACHE_HTTP_POOL_IDLE_TIMEOUT_SECS` and `HTTPCACHE_PROXY_URL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: env::var("HTTPCACHE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            pool_max_idle_per_host: env::var("HTTPCACHE_HTTP_POOL_MAX_IDLE_PER_HOST")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.pool_max_idle_per_host),
            pool_idle_timeout: env::var("HTTPCACHE_HTTP_POOL_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.pool_idle_timeout),
            proxy_url: env::var("HTTPCACHE_PROXY_URL").ok().filter(|s| !s.is_empty()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }
}

/// Network transport over a pooled `reqwest::Client`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpTransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(config.pool_idle_timeout))
            // Conservative HTTP/2 keepalive defaults for long-lived connections.
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    "invalid proxy URL",
                    ErrorContext::new()
                        .with_field_path("HTTPCACHE_PROXY_URL")
                        .with_details(e.to_string())
                        .with_source("http_transport"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&HttpTransportConfig::from_env())
    }

    /// Wraps an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(&self, req: reqwest::Request) -> Result<Response> {
        let mut resp = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = resp.status();
        let version = resp.version();
        let headers = std::mem::take(resp.headers_mut());
        let body = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));

        Ok(Response {
            status,
            version,
            headers,
            body: Body::from_stream(body),
        })
    }
}
