//! Serialized form of a cached response head.

use super::{Body, Response};
use crate::headers::X_FROM_CACHE;
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{StatusCode, Version};
use serde::{Deserialize, Serialize};

/// Status line and headers of a stored response, in header order with
/// repeated names kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHead {
    pub status: u16,
    pub version: String,
    pub headers: Vec<StoredHeader>,
}

/// One header line. The value is kept byte for byte, since HTTP allows
/// obs-text (0x80-0xFF) that is not UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHeader {
    pub name: String,
    #[serde(with = "base64_value")]
    pub value: Vec<u8>,
}

impl StoredHeader {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

mod base64_value {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

impl StoredHead {
    /// Captures the head of `resp`, leaving out the `X-From-Cache` marker.
    pub fn from_response(resp: &Response) -> Self {
        let headers = resp
            .headers
            .iter()
            .filter(|(name, _)| name.as_str() != X_FROM_CACHE)
            .map(|(name, value)| StoredHeader::new(name.as_str(), value.as_bytes()))
            .collect();
        Self {
            status: resp.status.as_u16(),
            version: format!("{:?}", resp.version),
            headers,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for header in &self.headers {
            let name = HeaderName::from_bytes(header.name.as_bytes())
                .map_err(|e| malformed("headers", e))?;
            let value =
                HeaderValue::from_bytes(&header.value).map_err(|e| malformed("headers", e))?;
            map.append(name, value);
        }
        Ok(map)
    }

    pub fn into_response(self, body: Body) -> Result<Response> {
        let status = StatusCode::from_u16(self.status).map_err(|e| malformed("status", e))?;
        let headers = self.header_map()?;
        Ok(Response {
            status,
            version: parse_version(&self.version),
            headers,
            body,
        })
    }
}

fn malformed(field: &str, err: impl std::fmt::Display) -> Error {
    Error::runtime_with_context(
        "malformed cached response head",
        ErrorContext::new()
            .with_field_path(format!("head.{}", field))
            .with_details(err.to_string())
            .with_source("stored_head"),
    )
}

fn parse_version(v: &str) -> Version {
    match v {
        "HTTP/0.9" => Version::HTTP_09,
        "HTTP/1.0" => Version::HTTP_10,
        "HTTP/2.0" => Version::HTTP_2,
        "HTTP/3.0" => Version::HTTP_3,
        _ => Version::HTTP_11,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_keeps_order_and_duplicates() {
        let resp = Response::new(StatusCode::NOT_FOUND, Body::empty())
            .with_header(HeaderName::from_static("set-cookie"), HeaderValue::from_static("a=1"))
            .with_header(HeaderName::from_static("set-cookie"), HeaderValue::from_static("b=2"))
            .with_header(HeaderName::from_static("etag"), HeaderValue::from_static("\"v1\""))
            .with_header(HeaderName::from_static(X_FROM_CACHE), HeaderValue::from_static("1"));
        let head = StoredHead::from_response(&resp);
        assert_eq!(head.status, 404);
        assert_eq!(head.version, "HTTP/1.1");
        assert_eq!(
            head.headers,
            vec![
                StoredHeader::new("set-cookie", "a=1"),
                StoredHeader::new("set-cookie", "b=2"),
                StoredHeader::new("etag", "\"v1\""),
            ]
        );

        let decoded = StoredHead::decode(&head.encode().unwrap()).unwrap();
        assert_eq!(decoded, head);
        let rebuilt = decoded.into_response(Body::empty()).unwrap();
        assert_eq!(rebuilt.status, StatusCode::NOT_FOUND);
        assert_eq!(rebuilt.headers.get_all("set-cookie").iter().count(), 2);
        assert!(!rebuilt.is_from_cache());
    }

    #[test]
    fn test_non_utf8_value_survives_encoding() {
        let raw = b"attachment; filename=\"caf\xe9.txt\"";
        let resp = Response::new(StatusCode::OK, Body::empty()).with_header(
            HeaderName::from_static("content-disposition"),
            HeaderValue::from_bytes(raw).unwrap(),
        );
        let head = StoredHead::decode(&StoredHead::from_response(&resp).encode().unwrap()).unwrap();
        let rebuilt = head.into_response(Body::empty()).unwrap();
        assert_eq!(rebuilt.headers.get("content-disposition").unwrap().as_bytes(), raw);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            StoredHead::decode(b"HTTP/1.1 200 OK\r\n"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_bad_value_encoding_is_serialization_error() {
        let json =
            br#"{"status":200,"version":"HTTP/1.1","headers":[{"name":"etag","value":"%%"}]}"#;
        assert!(matches!(StoredHead::decode(json), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_invalid_header_value_is_runtime_error() {
        let head = StoredHead {
            status: 200,
            version: "HTTP/1.1".into(),
            headers: vec![StoredHeader::new("etag", b"a\nb".to_vec())],
        };
        let err = head.into_response(Body::empty()).unwrap_err();
        assert_eq!(err.context().unwrap().field_path.as_deref(), Some("head.headers"));
    }

    #[test]
    fn test_invalid_status_is_runtime_error() {
        let head = StoredHead {
            status: 1000,
            version: "HTTP/1.1".into(),
            headers: vec![],
        };
        let err = head.into_response(Body::empty()).unwrap_err();
        assert_eq!(err.context().unwrap().field_path.as_deref(), Some("head.status"));
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!(parse_version("HTTP/2.0"), Version::HTTP_2);
        assert_eq!(parse_version("HTTP/1.0"), Version::HTTP_10);
        assert_eq!(parse_version("bogus"), Version::HTTP_11);
    }
}
