//! Request pipeline
//!
//! An ordered list of middleware in front of one endpoint. Each middleware
//! may inspect or mutate the request and then calls `next.run(request)`;
//! the last `Next` hands the request to the endpoint.

pub mod access_log;
pub mod rewrite;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::Request;

use crate::http::HttpResponse;

pub use access_log::AccessLog;
pub use rewrite::{DirectoryIndex, EntryKind, RewrittenPath};

/// Peer address of the connection a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

/// A request handler that sits in front of other handlers
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: Request<()>, next: Next<'_>) -> HttpResponse;
}

/// The handler that finally produces a response
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, req: Request<()>) -> HttpResponse;
}

/// The rest of the chain after the current middleware
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl Next<'_> {
    pub async fn run(self, req: Request<()>) -> HttpResponse {
        match self.middleware.split_first() {
            Some((current, rest)) => {
                current
                    .handle(
                        req,
                        Next {
                            middleware: rest,
                            endpoint: self.endpoint,
                        },
                    )
                    .await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

/// Middleware in registration order, then the endpoint
pub struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
    endpoint: Arc<dyn Endpoint>,
}

impl Pipeline {
    pub fn new(endpoint: Arc<dyn Endpoint>) -> Self {
        Self {
            middleware: Vec::new(),
            endpoint,
        }
    }

    /// Append a middleware; it runs after every middleware added before it
    #[must_use]
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    pub async fn dispatch(&self, req: Request<()>) -> HttpResponse {
        Next {
            middleware: &self.middleware,
            endpoint: self.endpoint.as_ref(),
        }
        .run(req)
        .await
    }
}
