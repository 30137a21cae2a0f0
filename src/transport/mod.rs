//! # Transport Module
//!
//! The round-trip contract shared by the network transport and the caching
//! decorator, plus the owned [`Response`] type both produce.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Transport`] | Issue one request, return a response or an error |
//! | [`HttpTransport`] | `reqwest`-backed network transport |
//! | [`CachingTransport`] | RFC 7234 private cache wrapping any [`Transport`] |
//! | [`Response`] / [`Body`] | Owned response head with a streaming body |

mod body;
mod caching;
mod entry;
mod http;

pub use caching::{CacheConfig, CacheStats, CachingTransport};
pub use entry::{StoredHead, StoredHeader};
pub use http::{HttpTransport, HttpTransportConfig};

use crate::headers::X_FROM_CACHE;
use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{StatusCode, Version};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Issue an HTTP request and return its response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, req: reqwest::Request) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn round_trip(&self, req: reqwest::Request) -> Result<Response> {
        (**self).round_trip(req).await
    }
}

/// A streaming response body.
pub struct Body {
    inner: BoxStream<'static, Bytes>,
}

impl Body {
    pub fn empty() -> Self {
        Self::from_stream(futures::stream::empty())
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    pub fn into_stream(self) -> BoxStream<'static, Bytes> {
        self.inner
    }

    /// Reads the remaining body into memory.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for Body {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Body { .. }")
    }
}

impl From<Bytes> for Body {
    fn from(data: Bytes) -> Self {
        if data.is_empty() {
            return Self::empty();
        }
        Self::from_stream(futures::stream::once(async move { Ok::<_, Error>(data) }))
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Bytes::from(data).into()
    }
}

impl From<String> for Body {
    fn from(data: String) -> Self {
        Bytes::from(data).into()
    }
}

impl From<&'static str> for Body {
    fn from(data: &'static str) -> Self {
        Bytes::from_static(data.as_bytes()).into()
    }
}

/// An owned HTTP response.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Body>) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// The synthetic reply to an `only-if-cached` request that has no stored
    /// response.
    pub fn gateway_timeout() -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, Body::empty())
    }

    /// True when the response carries the `X-From-Cache` marker.
    pub fn is_from_cache(&self) -> bool {
        self.headers.contains_key(X_FROM_CACHE)
    }

    pub async fn bytes(self) -> Result<Bytes> {
        self.body.bytes().await
    }

    pub async fn text(self) -> Result<String> {
        let data = self.body.bytes().await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_body_collects_chunks() {
        let items: Vec<Result<Bytes>> = vec![Ok(Bytes::from("Hel")), Ok(Bytes::from("lo"))];
        let body = Body::from_stream(futures::stream::iter(items));
        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"Hello"));
        assert!(Body::empty().bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_body_surfaces_stream_error() {
        let items: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from("a")),
            Err(Error::from(TransportError::Other("reset".into()))),
        ];
        let body = Body::from_stream(futures::stream::iter(items));
        assert!(body.bytes().await.is_err());
    }

    #[tokio::test]
    async fn test_response_helpers() {
        let resp = Response::new(StatusCode::OK, "hi").with_header(
            HeaderName::from_static(X_FROM_CACHE),
            HeaderValue::from_static("1"),
        );
        assert!(resp.is_from_cache());
        assert_eq!(resp.text().await.unwrap(), "hi");

        let timeout = Response::gateway_timeout();
        assert_eq!(timeout.status, StatusCode::GATEWAY_TIMEOUT);
        assert!(!timeout.is_from_cache());
    }
}
