//! Cache key generation.

use reqwest::{Method, Url};
use sha2::{Digest, Sha256};

/// The pair of keys under which one cached response is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    base: String,
}

impl CacheKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        Self {
            base: format!("{}-{}", method.as_str(), url.as_str()),
        }
    }

    pub fn for_request(req: &reqwest::Request) -> Self {
        Self::new(req.method(), req.url())
    }

    /// Key of the serialized response head: `header-<METHOD>-<URL>`.
    pub fn header(&self) -> String {
        format!("header-{}", self.base)
    }

    /// Key of the response body: `body-<METHOD>-<URL>`.
    pub fn body(&self) -> String {
        format!("body-{}", self.base)
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)
    }
}

/// Hex SHA-256 of a raw key, used where keys must become safe file names.
pub fn hashed_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
