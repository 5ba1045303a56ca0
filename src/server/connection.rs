// Connection handling module
// Accepts a TCP connection and serves it through the request pipeline

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::config::Config;
use crate::logger;
use crate::pipeline::{ClientAddr, Pipeline};

/// Everything a connection task needs, shared across connections
pub struct ServerContext {
    pub pipeline: Pipeline,
    active_connections: AtomicUsize,
    max_connections: Option<u64>,
    keep_alive: bool,
    /// Whole-connection limit; zero disables it
    request_timeout: Duration,
}

impl ServerContext {
    pub fn new(pipeline: Pipeline, config: &Config) -> Self {
        Self {
            pipeline,
            active_connections: AtomicUsize::new(0),
            max_connections: config.performance.max_connections,
            keep_alive: config.performance.keep_alive,
            request_timeout: Duration::from_secs(config.performance.request_timeout),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }
}

/// Accept a connection unless the connection limit is reached.
pub fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, ctx: &Arc<ServerContext>) {
    // Increment first, then check, so concurrent accepts cannot both slip in
    let prev_count = ctx.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = ctx.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            ctx.active_connections.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);
    handle_connection(stream, peer_addr, Arc::clone(ctx));
}

/// Serve one connection on its own task.
///
/// The inbound body is dropped: the pipeline only sees the request head,
/// with the peer address attached as `ClientAddr`.
fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<ServerContext>) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let mut builder = http1::Builder::new();
        builder.keep_alive(ctx.keep_alive);

        let service_ctx = Arc::clone(&ctx);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req: Request<Incoming>| {
                let ctx = Arc::clone(&service_ctx);
                async move {
                    let (parts, _body) = req.into_parts();
                    let mut req = Request::from_parts(parts, ());
                    req.extensions_mut().insert(ClientAddr(peer_addr));
                    Ok::<_, Infallible>(ctx.pipeline.dispatch(req).await)
                }
            }),
        );

        if ctx.request_timeout.is_zero() {
            if let Err(err) = conn.await {
                logger::log_connection_error(&err);
            }
        } else {
            match tokio::time::timeout(ctx.request_timeout, conn).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => logger::log_connection_error(&err),
                Err(_) => logger::log_warning(&format!(
                    "Connection from {peer_addr} closed after {} seconds",
                    ctx.request_timeout.as_secs()
                )),
            }
        }

        ctx.active_connections.fetch_sub(1, Ordering::SeqCst);
    });
}
