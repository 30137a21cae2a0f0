//! Freshness evaluation for stored responses (RFC 7234 §4.2, RFC 5861).
//!
//! Everything here is a pure function of header maps and a [`Clock`]. Ages and
//! lifetimes are signed: a `Date` in the future yields a negative age and
//! `max-stale` may push the age below zero.

use crate::{Error, Result};
use reqwest::header::{HeaderMap, CACHE_CONTROL, DATE, EXPIRES};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// How a stored response may be used for a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Serve from the cache without contacting the origin.
    Fresh,
    /// Revalidate with a conditional request before serving.
    Stale,
    /// Ignore the stored response for this request.
    Transparent,
}

/// Source of "now". Swappable so that tests can pin time.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: SystemTime) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Signed nanoseconds.
type Age = i128;

fn nanos(d: Duration) -> Age {
    d.as_nanos() as Age
}

fn seconds(s: i64) -> Age {
    s as Age * 1_000_000_000
}

/// `later - earlier`, negative when `later` is before `earlier`.
fn signed_diff(later: SystemTime, earlier: SystemTime) -> Age {
    match later.duration_since(earlier) {
        Ok(d) => nanos(d),
        Err(e) => -nanos(e.duration()),
    }
}

/// Parsed `Cache-Control` directives. Valueless and empty-valued directives
/// map to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    directives: HashMap<String, Option<String>>,
}

impl CacheControl {
    /// Parses every `Cache-Control` value in `headers`. Later duplicates win.
    pub fn parse(headers: &HeaderMap) -> Self {
        let mut directives = HashMap::new();
        for value in headers.get_all(CACHE_CONTROL) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for part in value.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                // `name=` with nothing after it counts as valueless.
                match part.split_once('=') {
                    Some((name, val)) if !val.trim().is_empty() => {
                        directives.insert(name.trim().to_string(), Some(val.trim().to_string()))
                    }
                    Some((name, _)) => directives.insert(name.trim().to_string(), None),
                    None => directives.insert(part.to_string(), None),
                };
            }
        }
        Self { directives }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    /// `None` if absent, `Some(None)` if present without a value.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.directives.get(name).map(|v| v.as_deref())
    }

    /// Integer seconds of a valued directive. `None` when absent, valueless or
    /// unparseable.
    pub fn seconds(&self, name: &str) -> Option<i64> {
        self.get(name).flatten().and_then(parse_seconds)
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

fn parse_seconds(value: &str) -> Option<i64> {
    value.trim_matches('"').parse::<i64>().ok()
}

/// Value of the `Date` header.
pub fn response_date(headers: &HeaderMap) -> Result<SystemTime> {
    let raw = headers.get(DATE).ok_or(Error::NoDateHeader)?;
    let text = raw
        .to_str()
        .map_err(|_| Error::InvalidDate(String::from_utf8_lossy(raw.as_bytes()).into_owned()))?;
    httpdate::parse_http_date(text).map_err(|_| Error::InvalidDate(text.to_string()))
}

/// Classifies a stored response against a new request. The first matching
/// rule wins; the final comparison is `lifetime > current_age`, so a response
/// exactly at its expiry instant is stale.
pub fn freshness(
    resp_headers: &HeaderMap,
    req_headers: &HeaderMap,
    clock: &dyn Clock,
) -> Freshness {
    let resp_cc = CacheControl::parse(resp_headers);
    let req_cc = CacheControl::parse(req_headers);

    if req_cc.contains("no-cache") {
        return Freshness::Transparent;
    }
    if resp_cc.contains("no-cache") {
        return Freshness::Stale;
    }
    if req_cc.contains("only-if-cached") {
        return Freshness::Fresh;
    }

    let Ok(date) = response_date(resp_headers) else {
        return Freshness::Stale;
    };
    let mut current_age = signed_diff(clock.now(), date);

    let mut lifetime: Age = 0;
    if let Some(max_age) = resp_cc.get("max-age") {
        lifetime = max_age.and_then(parse_seconds).map(seconds).unwrap_or(0);
    } else if let Some(expires) = resp_headers.get(EXPIRES) {
        lifetime = expires
            .to_str()
            .ok()
            .and_then(|s| httpdate::parse_http_date(s).ok())
            .map(|expires| signed_diff(expires, date))
            .unwrap_or(0);
    }

    if let Some(max_age) = req_cc.get("max-age") {
        lifetime = max_age.and_then(parse_seconds).map(seconds).unwrap_or(0);
    }

    if let Some(min_fresh) = req_cc.seconds("min-fresh") {
        current_age += seconds(min_fresh);
    }

    if let Some(max_stale) = req_cc.get("max-stale") {
        match max_stale {
            None => return Freshness::Fresh,
            Some(value) => {
                if let Some(tolerance) = parse_seconds(value) {
                    current_age -= seconds(tolerance);
                }
            }
        }
    }

    if lifetime > current_age {
        Freshness::Fresh
    } else {
        Freshness::Stale
    }
}

/// RFC 5861 `stale-if-error`: whether a failed fetch may be masked by the
/// stored response. The request directive, when present, takes precedence
/// over the response's limit. Callers restrict this to GET and HEAD.
pub fn can_stale_on_error(
    resp_headers: &HeaderMap,
    req_headers: &HeaderMap,
    clock: &dyn Clock,
) -> bool {
    let resp_cc = CacheControl::parse(resp_headers);
    let req_cc = CacheControl::parse(req_headers);

    let mut limit: Option<Age> = None;
    for cc in [&resp_cc, &req_cc] {
        match cc.get("stale-if-error") {
            None => {}
            Some(None) => return true,
            Some(Some(value)) => match parse_seconds(value) {
                Some(s) => limit = Some(seconds(s)),
                None => return false,
            },
        }
    }

    let Some(limit) = limit else {
        return false;
    };
    if limit < 0 {
        return false;
    }
    match response_date(resp_headers) {
        Ok(date) => limit > signed_diff(clock.now(), date),
        Err(_) => false,
    }
}
