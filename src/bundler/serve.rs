//! Asset endpoint
//!
//! Serves the bundler's output root. Requests wait for a running build and
//! are answered with the build error while the last build is failing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::header::{HeaderName, IF_NONE_MATCH, RANGE};
use hyper::{Method, Request};
use percent_encoding::percent_decode_str;

use super::{BuildOutcome, Bundler};
use crate::http::cache::{etag_for, if_none_match};
use crate::http::range::{self, RangeOutcome};
use crate::http::{
    build_304_response, build_404_response, build_405_response, build_416_response,
    build_asset_response, build_build_error_response, build_options_response,
    build_partial_response, HttpResponse,
};
use crate::pipeline::Endpoint;

pub struct AssetEndpoint {
    bundler: Arc<Bundler>,
}

impl AssetEndpoint {
    pub const fn new(bundler: Arc<Bundler>) -> Self {
        Self { bundler }
    }

    /// File under the output root for a request path.
    ///
    /// `None` (404) for paths outside the public URL, `..` segments and
    /// undecodable paths. The public URL root maps to the main output file.
    fn locate(&self, path: &str) -> Option<PathBuf> {
        let config = self.bundler.config();
        let decoded = percent_decode_str(path).decode_utf8().ok()?;

        let base = config.public_url_base();
        let relative = if decoded == base.trim_end_matches('/') {
            ""
        } else {
            decoded.strip_prefix(base.as_str())?
        };

        let mut file = config.out_dir.clone();
        let mut depth = 0usize;
        for segment in relative.split('/') {
            match segment {
                "" | "." => {}
                ".." => return None,
                name => {
                    file.push(name);
                    depth += 1;
                }
            }
        }
        if depth == 0 {
            file.push(&config.out_file);
        }
        Some(file)
    }
}

#[async_trait]
impl Endpoint for AssetEndpoint {
    async fn call(&self, req: Request<()>) -> HttpResponse {
        match *req.method() {
            Method::GET | Method::HEAD => {}
            Method::OPTIONS => return build_options_response(),
            _ => return build_405_response(),
        }
        let is_head = req.method() == Method::HEAD;

        let (file, data) = {
            let state = self.bundler.state.read().await;
            if let BuildOutcome::Failed(message) = &state.outcome {
                return build_build_error_response(message, is_head);
            }
            let Some(file) = self.locate(req.uri().path()) else {
                return build_404_response();
            };
            // Missing files, directories and files removed by a rebuild all end here
            match tokio::fs::read(&file).await {
                Ok(data) => (file, Bytes::from(data)),
                Err(_) => return build_404_response(),
            }
        };

        let content_type = content_type_for(&file);
        let etag = etag_for(&data);

        if if_none_match(header_str(&req, IF_NONE_MATCH), &etag) {
            return build_304_response(&etag);
        }

        match range::resolve(header_str(&req, RANGE), data.len()) {
            RangeOutcome::Full => build_asset_response(data, &content_type, &etag, is_head),
            RangeOutcome::Partial(byte_range) => {
                build_partial_response(&data, byte_range, &content_type, &etag, is_head)
            }
            RangeOutcome::Unsatisfiable => build_416_response(data.len()),
        }
    }
}

fn header_str(req: &Request<()>, name: HeaderName) -> Option<&str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// `mime_guess` type, with a charset for text formats
fn content_type_for(file: &Path) -> String {
    let mime = mime_guess::from_path(file).first_or_octet_stream();
    let textual = mime.type_().as_str() == "text"
        || matches!(
            mime.essence_str(),
            "application/javascript" | "application/json" | "image/svg+xml"
        );
    if textual {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::testing::blog;
    use crate::pipeline::testing::body_string;
    use hyper::header::{ALLOW, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG};
    use hyper::StatusCode;

    async fn endpoint() -> (tempfile::TempDir, AssetEndpoint) {
        let (dir, config) = blog();
        let bundler = Arc::new(Bundler::new(config));
        bundler.bundle().await.unwrap();
        (dir, bundler.middleware())
    }

    fn get(uri: &str) -> Request<()> {
        Request::builder().uri(uri).body(()).unwrap()
    }

    #[tokio::test]
    async fn test_serves_file_with_type() {
        let (_dir, endpoint) = endpoint().await;
        let resp = endpoint.call(get("/styles/app.css")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/css; charset=utf-8");
        assert!(resp.headers().contains_key(ETAG));
        assert_eq!(body_string(resp).await, "h1 { color: red; }");
    }

    #[tokio::test]
    async fn test_root_serves_out_file() {
        let (_dir, endpoint) = endpoint().await;
        let resp = endpoint.call(get("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.contains("<h1>home</h1>"));
    }

    #[tokio::test]
    async fn test_directory_without_rewrite_is_404() {
        let (_dir, endpoint) = endpoint().await;
        assert_eq!(
            endpoint.call(get("/posts/my-post")).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            endpoint.call(get("/posts/my-post/index.html")).await.status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_missing_and_traversal_are_404() {
        let (_dir, endpoint) = endpoint().await;
        for path in ["/nope.css", "/../.cache/manifest.json", "/%2e%2e/secret"] {
            assert_eq!(
                endpoint.call(get(path)).await.status(),
                StatusCode::NOT_FOUND,
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn test_conditional_get() {
        let (_dir, endpoint) = endpoint().await;
        let etag = endpoint.call(get("/styles/app.css")).await.headers()[ETAG].clone();

        let req = Request::builder()
            .uri("/styles/app.css")
            .header(IF_NONE_MATCH, etag)
            .body(())
            .unwrap();
        assert_eq!(endpoint.call(req).await.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_range_requests() {
        let (_dir, endpoint) = endpoint().await;
        let req = Request::builder()
            .uri("/styles/app.css")
            .header(RANGE, "bytes=0-1")
            .body(())
            .unwrap();
        let resp = endpoint.call(req).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[CONTENT_RANGE], "bytes 0-1/18");
        assert_eq!(body_string(resp).await, "h1");

        let req = Request::builder()
            .uri("/styles/app.css")
            .header(RANGE, "bytes=100-")
            .body(())
            .unwrap();
        assert_eq!(
            endpoint.call(req).await.status(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
    }

    #[tokio::test]
    async fn test_head_and_methods() {
        let (_dir, endpoint) = endpoint().await;
        let head = Request::builder()
            .method(Method::HEAD)
            .uri("/styles/app.css")
            .body(())
            .unwrap();
        let resp = endpoint.call(head).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_LENGTH], "18");
        assert_eq!(body_string(resp).await, "");

        let options = Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .body(())
            .unwrap();
        let resp = endpoint.call(options).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(resp.headers().contains_key(ALLOW));

        let post = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(())
            .unwrap();
        assert_eq!(
            endpoint.call(post).await.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn test_public_url_prefix() {
        let (_dir, mut config) = blog();
        config.public_url = "/blog/".to_string();
        let bundler = Arc::new(Bundler::new(config));
        bundler.bundle().await.unwrap();
        let endpoint = bundler.middleware();

        assert_eq!(endpoint.call(get("/blog")).await.status(), StatusCode::OK);
        assert_eq!(endpoint.call(get("/blog/")).await.status(), StatusCode::OK);
        assert_eq!(
            endpoint.call(get("/blog/styles/app.css")).await.status(),
            StatusCode::OK
        );
        assert_eq!(
            endpoint.call(get("/styles/app.css")).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_failed_build_is_served_as_500() {
        let (_dir, config) = blog();
        let source = config.source_dir.clone();
        let bundler = Arc::new(Bundler::new(config));
        bundler.bundle().await.unwrap();

        std::fs::remove_dir_all(&source).unwrap();
        assert!(bundler.bundle().await.is_err());

        let resp = bundler.middleware().call(get("/styles/app.css")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(resp).await.contains("source directory not found"));
    }
}
