//! Scripted in-process transport for driving `CachingTransport` in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use httpcache::{Body, Error, ManualClock, Response, Transport, TransportError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Request, StatusCode, Url};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// One scripted outcome of a round trip.
#[derive(Clone)]
pub enum Reply {
    Ok {
        status: u16,
        headers: Vec<(&'static str, String)>,
        raw_headers: Vec<(&'static str, &'static [u8])>,
        body: &'static str,
    },
    Fail(&'static str),
}

impl Reply {
    pub fn ok(headers: Vec<(&'static str, String)>, body: &'static str) -> Self {
        Reply::Ok {
            status: 200,
            headers,
            raw_headers: Vec::new(),
            body,
        }
    }

    pub fn status(status: u16, headers: Vec<(&'static str, String)>, body: &'static str) -> Self {
        Reply::Ok {
            status,
            headers,
            raw_headers: Vec::new(),
            body,
        }
    }

    /// Adds a header whose value is given as raw bytes, which need not be UTF-8.
    pub fn with_raw_header(mut self, name: &'static str, value: &'static [u8]) -> Self {
        if let Reply::Ok { raw_headers, .. } = &mut self {
            raw_headers.push((name, value));
        }
        self
    }
}

/// Serves scripted replies in order; the last one repeats.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<HeaderMap>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    pub fn with_delay(replies: Vec<Reply>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Headers of the most recent request that reached the network.
    pub fn last_request_headers(&self) -> HeaderMap {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn round_trip(&self, req: Request) -> httpcache::Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(req.headers().clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = {
            let mut queue = self.replies.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = queue.pop_front() {
                *last = Some(next.clone());
                next
            } else {
                last.clone().expect("no scripted reply")
            }
        };

        match reply {
            Reply::Fail(msg) => Err(Error::Transport(TransportError::Other(msg.to_string()))),
            Reply::Ok {
                status,
                headers,
                raw_headers,
                body,
            } => {
                let status = StatusCode::from_u16(status).unwrap();
                let mut resp = Response::new(status, Body::from(body));
                for (name, value) in headers {
                    resp.headers.append(
                        HeaderName::from_static(name),
                        HeaderValue::from_str(&value).unwrap(),
                    );
                }
                for (name, value) in raw_headers {
                    resp.headers.append(
                        HeaderName::from_static(name),
                        HeaderValue::from_bytes(value).unwrap(),
                    );
                }
                Ok(resp)
            }
        }
    }
}

pub fn t0() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(t0()))
}

pub fn date_at(t: SystemTime) -> String {
    httpdate::fmt_http_date(t)
}

pub fn get(url: &str) -> Request {
    Request::new(Method::GET, Url::parse(url).unwrap())
}

pub fn request(method: Method, url: &str, headers: &[(&'static str, &'static str)]) -> Request {
    let mut req = Request::new(method, Url::parse(url).unwrap());
    for (name, value) in headers {
        req.headers_mut()
            .append(*name, HeaderValue::from_static(*value));
    }
    req
}

pub async fn body_text(resp: Response) -> String {
    String::from_utf8(resp.bytes().await.unwrap().to_vec()).unwrap()
}

pub fn bytes(s: &'static str) -> Bytes {
    Bytes::from_static(s.as_bytes())
}
