//! Directory index rewriting
//!
//! When a request path names a directory under the output root, the request
//! continues as `<path>/index.html`. Anything else passes through untouched,
//! including every request whose filesystem check fails.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hyper::http::uri::PathAndQuery;
use hyper::{Request, Uri};
use percent_encoding::percent_decode_str;

use super::{Middleware, Next};
use crate::http::HttpResponse;
use crate::logger;

/// What a candidate path is on disk at the moment of the check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Absent,
}

/// Inspect `path` without following a final symlink.
///
/// Errors other than "not found" are logged and reported as `Absent`.
pub async fn probe(path: &Path) -> EntryKind {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => EntryKind::Directory,
        Ok(_) => EntryKind::File,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => EntryKind::Absent,
        Err(e) => {
            logger::log_probe_failed(path, &e);
            EntryKind::Absent
        }
    }
}

/// Path the request continued with, attached to the response for access logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenPath(pub String);

/// Rewrites directory paths to their index document
pub struct DirectoryIndex {
    output_root: PathBuf,
    index_file: String,
}

impl DirectoryIndex {
    pub fn new(output_root: impl Into<PathBuf>, index_file: impl Into<String>) -> Self {
        Self {
            output_root: output_root.into(),
            index_file: index_file.into(),
        }
    }

    /// The path a request for `path` should continue with, or `None` to
    /// leave it unchanged. The check always runs against `path` as given.
    pub async fn rewrite(&self, path: &str) -> Option<String> {
        let candidate = self.candidate(path)?;
        match probe(&candidate).await {
            EntryKind::Directory => Some(append_index(path, &self.index_file)),
            EntryKind::File | EntryKind::Absent => None,
        }
    }

    /// `output_root` joined with the decoded request path.
    ///
    /// `None` for the output root itself (the endpoint owns `/`), for paths
    /// that do not start with `/`, for `..` segments and for undecodable paths.
    fn candidate(&self, path: &str) -> Option<PathBuf> {
        if !path.starts_with('/') {
            return None;
        }
        let decoded = percent_decode_str(path).decode_utf8().ok()?;

        let mut candidate = self.output_root.clone();
        let mut depth = 0usize;
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => return None,
                name => {
                    candidate.push(name);
                    depth += 1;
                }
            }
        }
        (depth > 0).then_some(candidate)
    }
}

/// `/a` -> `/a/index.html`, `/a/` -> `/a/index.html`
pub fn append_index(path: &str, index_file: &str) -> String {
    if path.ends_with('/') {
        format!("{path}{index_file}")
    } else {
        format!("{path}/{index_file}")
    }
}

/// Same URI with the path replaced and the query kept
fn with_path(uri: &Uri, path: &str) -> Result<Uri, hyper::http::Error> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}

#[async_trait]
impl Middleware for DirectoryIndex {
    async fn handle(&self, mut req: Request<()>, next: Next<'_>) -> HttpResponse {
        let Some(rewritten) = self.rewrite(req.uri().path()).await else {
            return next.run(req).await;
        };

        match with_path(req.uri(), &rewritten) {
            Ok(uri) => {
                logger::log_rewrite(req.uri().path(), &rewritten);
                *req.uri_mut() = uri;
                let mut resp = next.run(req).await;
                resp.extensions_mut().insert(RewrittenPath(rewritten));
                resp
            }
            Err(e) => {
                logger::log_warning(&format!("Cannot rewrite to '{rewritten}': {e}"));
                next.run(req).await
            }
        }
    }
}
