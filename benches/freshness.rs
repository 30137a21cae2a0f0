//! Benchmarks for the per-request header work on the cache hit path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use httpcache::freshness::{freshness, CacheControl, ManualClock};
use httpcache::headers::vary_matches;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::{Duration, SystemTime};

fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(
            HeaderName::from_static(*name),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    map
}

fn bench_cache_control(c: &mut Criterion) {
    let map = headers(&[(
        "cache-control",
        "public, max-age=3600, stale-if-error=600, must-revalidate, s-maxage=60",
    )]);
    c.bench_function("cache_control_parse", |b| {
        b.iter(|| CacheControl::parse(black_box(&map)))
    });
}

fn bench_freshness(c: &mut Criterion) {
    let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let clock = ManualClock::new(t0 + Duration::from_secs(30));
    let date = httpdate::fmt_http_date(t0);
    let expires_at = httpdate::fmt_http_date(t0 + Duration::from_secs(60));
    let resp = headers(&[("date", date.as_str()), ("cache-control", "max-age=60")]);
    let expires = headers(&[("date", date.as_str()), ("expires", expires_at.as_str())]);
    let req = headers(&[("accept", "text/html")]);

    let mut group = c.benchmark_group("freshness");
    group.bench_function("max_age", |b| {
        b.iter(|| freshness(black_box(&resp), black_box(&req), &clock))
    });
    group.bench_function("expires", |b| {
        b.iter(|| freshness(black_box(&expires), black_box(&req), &clock))
    });
    group.finish();
}

fn bench_vary(c: &mut Criterion) {
    let stored = headers(&[
        ("vary", "Accept-Encoding, Accept-Language"),
        ("x-varied-accept-encoding", "gzip"),
        ("x-varied-accept-language", "en"),
    ]);
    let req = headers(&[("accept-encoding", "gzip"), ("accept-language", "en")]);
    c.bench_function("vary_matches", |b| {
        b.iter(|| vary_matches(black_box(&stored), black_box(&req)))
    });
}

criterion_group!(benches, bench_cache_control, bench_freshness, bench_vary);
criterion_main!(benches);
