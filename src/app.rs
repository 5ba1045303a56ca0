//! Entry points for the two run modes

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::bundler::{watch, BundleReport, Bundler};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logger;
use crate::pipeline::{AccessLog, DirectoryIndex, Pipeline};
use crate::server::{self, ServerContext};

/// Production: build once and report. Any build failure is returned.
pub async fn run_build_once(config: &Config) -> Result<BundleReport> {
    let bundler = Bundler::new(config.bundle.clone());
    Ok(bundler.bundle().await?)
}

/// `[AccessLog?] -> DirectoryIndex -> AssetEndpoint`
pub fn build_pipeline(config: &Config, bundler: &Arc<Bundler>) -> Pipeline {
    let mut pipeline = Pipeline::new(Arc::new(bundler.middleware()));
    if config.logging.access_log {
        pipeline = pipeline.with(AccessLog::new(&config.logging.access_log_format));
    }
    pipeline.with(DirectoryIndex::new(
        config.output_root(),
        config.server.index_file.clone(),
    ))
}

/// A bound development server that has not started accepting yet
pub struct DevServer {
    listener: TcpListener,
    context: Arc<ServerContext>,
    shutdown: Arc<Notify>,
}

impl DevServer {
    /// Bind the configured address. Must be called inside a tokio runtime.
    pub fn bind(config: &Config, bundler: &Arc<Bundler>) -> Result<Self> {
        let addr = config.get_socket_addr()?;
        let listener =
            server::create_listener(addr).map_err(|source| Error::Bind { addr, source })?;
        Ok(Self {
            listener,
            context: Arc::new(ServerContext::new(build_pipeline(config, bundler), config)),
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Notify once to stop accepting connections
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub async fn run(self) {
        server::server_loop(self.listener, self.context, self.shutdown).await;
    }
}

/// Development: bundle, watch, serve until SIGINT/SIGTERM.
///
/// A failing initial build is not fatal: it is served as an error page until
/// a later build succeeds.
pub async fn run_dev_server(config: Config) -> Result<()> {
    let bundler = Arc::new(Bundler::new(config.bundle.clone()));
    if bundler.bundle().await.is_err() {
        logger::log_warning("Serving the build error until the next successful build");
    }

    let _watch = if config.watch_enabled() {
        Some(watch(Arc::clone(&bundler))?)
    } else {
        None
    };

    let server = DevServer::bind(&config, &bundler)?;
    logger::log_server_start(&server.local_addr()?, &config);
    server::start_signal_handler(server.shutdown_handle(), Arc::clone(&bundler))?;

    server.run().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::testing::blog;
    use crate::config::{Mode, Overrides};
    use crate::pipeline::testing::body_string;
    use hyper::{Request, StatusCode};

    fn config_for(bundle: crate::config::BundleConfig) -> Config {
        let mut config =
            Config::load_from("does-not-exist/sitepack-test-config", &Overrides::default())
                .unwrap();
        config.bundle = bundle;
        config
    }

    #[tokio::test]
    async fn test_build_once() {
        let (_dir, bundle) = blog();
        let mut config = config_for(bundle);
        config.mode = Mode::Production;
        let report = run_build_once(&config).await.unwrap();
        assert_eq!(report.entries, 2);
        assert!(config.output_root().join("index.html").is_file());
    }

    #[tokio::test]
    async fn test_build_once_fails_without_source() {
        let (dir, mut bundle) = blog();
        bundle.source_dir = dir.path().join("missing");
        let config = config_for(bundle);
        assert!(matches!(
            run_build_once(&config).await,
            Err(Error::Build(_))
        ));
    }

    #[tokio::test]
    async fn test_pipeline_rewrites_then_serves() {
        let (_dir, bundle) = blog();
        let mut config = config_for(bundle);
        config.logging.access_log = false;
        let bundler = Arc::new(Bundler::new(config.bundle.clone()));
        bundler.bundle().await.unwrap();

        let pipeline = build_pipeline(&config, &bundler);
        assert_eq!(pipeline.len(), 1);

        let cases = [
            ("/posts/my-post", StatusCode::OK),
            ("/posts/my-post/", StatusCode::OK),
            ("/styles/app.css", StatusCode::OK),
            ("/", StatusCode::OK),
            ("/does/not/exist", StatusCode::NOT_FOUND),
        ];
        for (path, status) in cases {
            let req = Request::builder().uri(path).body(()).unwrap();
            assert_eq!(pipeline.dispatch(req).await.status(), status, "{path}");
        }

        let req = Request::builder().uri("/posts/my-post").body(()).unwrap();
        assert!(body_string(pipeline.dispatch(req).await)
            .await
            .contains("my post"));
    }

    #[tokio::test]
    async fn test_public_url_prefix_is_not_stripped_by_router() {
        let (_dir, mut bundle) = blog();
        bundle.public_url = "/blog/".to_string();
        let mut config = config_for(bundle);
        config.logging.access_log = false;
        let bundler = Arc::new(Bundler::new(config.bundle.clone()));
        bundler.bundle().await.unwrap();
        let pipeline = build_pipeline(&config, &bundler);

        // The router checks OutputRoot/blog/posts/my-post, which does not exist
        let cases = [
            ("/blog/posts/my-post", StatusCode::NOT_FOUND),
            ("/blog/posts/my-post/index.html", StatusCode::OK),
            ("/blog/", StatusCode::OK),
        ];
        for (path, status) in cases {
            let req = Request::builder().uri(path).body(()).unwrap();
            assert_eq!(pipeline.dispatch(req).await.status(), status, "{path}");
        }
    }

    #[tokio::test]
    async fn test_access_log_is_optional() {
        let (_dir, bundle) = blog();
        let config = config_for(bundle);
        let bundler = Arc::new(Bundler::new(config.bundle.clone()));
        assert_eq!(build_pipeline(&config, &bundler).len(), 2);
    }
}
