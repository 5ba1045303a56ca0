//! HTTP response building module
//!
//! Builders for the status codes the asset endpoint produces. A builder
//! failure is logged and degrades to an empty 500 response instead of panicking.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    ACCEPT_RANGES, ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
};
use hyper::{Response, StatusCode};

use super::range::ByteRange;

pub type HttpResponse = Response<Full<Bytes>>;

const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Assets change on every rebuild, so browsers must revalidate
const DEV_CACHE_CONTROL: &str = "no-cache";

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str) -> HttpResponse {
    finish(
        "304",
        Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(ETAG, etag)
            .header(CACHE_CONTROL, DEV_CACHE_CONTROL)
            .body(Full::new(Bytes::new())),
    )
}

/// Build 404 Not Found response
pub fn build_404_response() -> HttpResponse {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> HttpResponse {
    finish(
        "405",
        Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .header(CONTENT_TYPE, "text/plain")
            .header(ALLOW, ALLOWED_METHODS)
            .body(Full::new(Bytes::from_static(b"405 Method Not Allowed"))),
    )
}

/// Build OPTIONS response
pub fn build_options_response() -> HttpResponse {
    finish(
        "OPTIONS",
        Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header(ALLOW, ALLOWED_METHODS)
            .body(Full::new(Bytes::new())),
    )
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(total_size: usize) -> HttpResponse {
    finish(
        "416",
        Response::builder()
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(CONTENT_TYPE, "text/plain")
            .header(CONTENT_RANGE, format!("bytes */{total_size}"))
            .body(Full::new(Bytes::from_static(b"Range Not Satisfiable"))),
    )
}

/// Build the page shown while the last build is failing
pub fn build_build_error_response(message: &str, is_head: bool) -> HttpResponse {
    let body = format!("Build failed\n\n{message}\n");
    let len = body.len();
    finish(
        "500",
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(CONTENT_LENGTH, len)
            .header(CACHE_CONTROL, "no-store")
            .body(Full::new(if is_head {
                Bytes::new()
            } else {
                Bytes::from(body)
            })),
    )
}

/// Build 200 response for a whole asset
pub fn build_asset_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    is_head: bool,
) -> HttpResponse {
    let len = data.len();
    finish(
        "200",
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, len)
            .header(ACCEPT_RANGES, "bytes")
            .header(ETAG, etag)
            .header(CACHE_CONTROL, DEV_CACHE_CONTROL)
            .body(Full::new(if is_head { Bytes::new() } else { data })),
    )
}

/// Build 206 Partial Content response; `data` is the whole asset
pub fn build_partial_response(
    data: &Bytes,
    range: ByteRange,
    content_type: &str,
    etag: &str,
    is_head: bool,
) -> HttpResponse {
    let body = if is_head {
        Bytes::new()
    } else {
        data.slice(range.start..=range.end)
    };
    finish(
        "206",
        Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, range.byte_count())
            .header(CONTENT_RANGE, range.content_range(data.len()))
            .header(ACCEPT_RANGES, "bytes")
            .header(ETAG, etag)
            .header(CACHE_CONTROL, DEV_CACHE_CONTROL)
            .body(Full::new(body)),
    )
}

fn build_text_response(status: StatusCode, text: &'static str) -> HttpResponse {
    finish(
        status.as_str(),
        Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from_static(text.as_bytes()))),
    )
}

fn finish(label: &str, built: Result<HttpResponse, hyper::http::Error>) -> HttpResponse {
    built.unwrap_or_else(|e| {
        crate::logger::log_error(&format!("Failed to build {label} response: {e}"));
        let mut resp = Response::new(Full::new(Bytes::new()));
        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        resp
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_slices_body() {
        let data = Bytes::from_static(b"0123456789");
        let resp = build_partial_response(
            &data,
            ByteRange { start: 2, end: 4 },
            "text/plain",
            "\"e\"",
            false,
        );
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[CONTENT_RANGE], "bytes 2-4/10");
        assert_eq!(resp.headers()[CONTENT_LENGTH], "3");
    }

    #[test]
    fn test_head_keeps_length() {
        let resp = build_asset_response(Bytes::from_static(b"hello"), "text/plain", "\"e\"", true);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_LENGTH], "5");
    }

    #[test]
    fn test_405_lists_allowed_methods() {
        let resp = build_405_response();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[ALLOW], ALLOWED_METHODS);
    }

    #[test]
    fn test_builder_failure_is_500() {
        let built = Response::builder()
            .status(StatusCode::OK)
            .header("bad header", "x")
            .body(Full::new(Bytes::from_static(b"hello")));
        let resp = finish("200", built);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
