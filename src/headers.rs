//! Header helpers shared by the caching transport.

use reqwest::header::{HeaderMap, HeaderName, CONNECTION, VARY};

/// Marker added to responses served from the cache when
/// [`CacheConfig::mark_cached_responses`](crate::transport::CacheConfig) is on.
pub const X_FROM_CACHE: &str = "x-from-cache";

/// Prefix of the synthetic headers recording the request values a stored
/// response varied on.
pub const X_VARIED_PREFIX: &str = "x-varied-";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Every comma separated field across all values of `name`, trimmed.
/// Empty fields are dropped.
pub fn all_comma_sep_values(headers: &HeaderMap, name: impl AsRef<str>) -> Vec<String> {
    headers
        .get_all(name.as_ref())
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

/// Name of the synthetic header holding the request value of `vary_name`.
pub fn varied_header_name(vary_name: &str) -> Option<HeaderName> {
    let name = format!("{}{}", X_VARIED_PREFIX, vary_name.to_ascii_lowercase());
    HeaderName::from_bytes(name.as_bytes()).ok()
}

fn value_bytes<'a>(headers: &'a HeaderMap, name: &HeaderName) -> &'a [u8] {
    headers.get(name).map(|v| v.as_bytes()).unwrap_or(b"")
}

/// True when every header named in the stored response's `Vary` has the same
/// value in `req_headers` as was recorded when the response was stored.
/// Absent and empty count as equal.
pub fn vary_matches(cached_headers: &HeaderMap, req_headers: &HeaderMap) -> bool {
    for field in all_comma_sep_values(cached_headers, VARY) {
        let (Ok(name), Some(varied)) = (
            HeaderName::from_bytes(field.as_bytes()),
            varied_header_name(&field),
        ) else {
            // A Vary field that is not a valid header name can never match.
            return false;
        };
        if value_bytes(req_headers, &name) != value_bytes(cached_headers, &varied) {
            return false;
        }
    }
    true
}

/// Records `X-Varied-<Name>` on `resp_headers` for every `Vary` field the
/// request carries a non-empty value for.
pub fn record_varied(resp_headers: &mut HeaderMap, req_headers: &HeaderMap) {
    for field in all_comma_sep_values(resp_headers, VARY) {
        let (Ok(name), Some(varied)) = (
            HeaderName::from_bytes(field.as_bytes()),
            varied_header_name(&field),
        ) else {
            continue;
        };
        match req_headers.get(&name) {
            Some(value) if !value.is_empty() => {
                resp_headers.insert(varied, value.clone());
            }
            _ => {}
        }
    }
}

/// Names of the headers in `resp_headers` that are not hop-by-hop, including
/// the extra hop-by-hop names listed in its own `Connection` header.
pub fn end_to_end_headers(resp_headers: &HeaderMap) -> Vec<HeaderName> {
    let extra: Vec<String> = all_comma_sep_values(resp_headers, CONNECTION)
        .into_iter()
        .map(|f| f.to_ascii_lowercase())
        .collect();
    resp_headers
        .keys()
        .filter(|name| {
            let name = name.as_str();
            !HOP_BY_HOP.contains(&name) && !extra.iter().any(|e| e == name)
        })
        .cloned()
        .collect()
}

/// Replaces, in `cached`, every end-to-end header present in `fresh`.
pub fn merge_end_to_end(cached: &mut HeaderMap, fresh: &HeaderMap) {
    for name in end_to_end_headers(fresh) {
        cached.remove(&name);
        for value in fresh.get_all(&name) {
            cached.append(name.clone(), value.clone());
        }
    }
}
