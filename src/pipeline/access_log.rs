//! Access logging middleware
//!
//! Placed first in the pipeline so it sees the path as the client sent it
//! and the final response.

use std::time::Instant;

use async_trait::async_trait;
use hyper::body::Body;
use hyper::header::{REFERER, USER_AGENT};
use hyper::{Request, Version};

use super::{ClientAddr, Middleware, Next, RewrittenPath};
use crate::http::HttpResponse;
use crate::logger::{self, AccessLogEntry, AccessLogFormat};

pub struct AccessLog {
    format: AccessLogFormat,
}

impl AccessLog {
    pub fn new(format: &str) -> Self {
        Self {
            format: AccessLogFormat::parse(format),
        }
    }
}

#[async_trait]
impl Middleware for AccessLog {
    async fn handle(&self, req: Request<()>, next: Next<'_>) -> HttpResponse {
        let started = Instant::now();
        let mut entry = start_entry(&req);

        let resp = next.run(req).await;

        finish_entry(&mut entry, &resp, started);
        logger::log_access(&entry, &self.format);
        resp
    }
}

/// Request half of the log line
fn start_entry<B>(req: &Request<B>) -> AccessLogEntry {
    let remote = req
        .extensions()
        .get::<ClientAddr>()
        .map_or_else(|| "-".to_string(), |addr| addr.0.ip().to_string());

    let mut entry = AccessLogEntry::new(
        remote,
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.referer = header_string(req, REFERER);
    entry.user_agent = header_string(req, USER_AGENT);
    entry
}

/// Response half of the log line
fn finish_entry(entry: &mut AccessLogEntry, resp: &HttpResponse, started: Instant) {
    entry.status = resp.status().as_u16();
    entry.body_bytes = resp.body().size_hint().exact().unwrap_or(0);
    entry.rewritten_path = resp
        .extensions()
        .get::<RewrittenPath>()
        .map(|rewritten| rewritten.0.clone());
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
}

fn header_string<B>(req: &Request<B>, name: hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
