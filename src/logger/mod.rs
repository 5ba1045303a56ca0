//! Logger module
//!
//! Installs the global `tracing` subscriber and keeps the wording of
//! lifecycle messages in one place:
//! - Server and bundler lifecycle logging
//! - Access logging with multiple formats
//! - Error and warning logging

mod format;

pub use format::{AccessLogEntry, AccessLogFormat};

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;

use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::bundler::BundleReport;
use crate::config::{Config, LogFormat, LoggingConfig};
use crate::error::{BuildError, Error};

/// Target used for access lines, so they can be filtered separately
pub const ACCESS_TARGET: &str = "access";

/// Initialize the logger with configuration
///
/// Should be called once at application startup. `RUST_LOG` overrides
/// `logging.level` when set.
pub fn init(logging: &LoggingConfig) -> Result<(), Error> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| Error::Logging(format!("invalid log level '{}': {e}", logging.level)))?;

    let (writer, ansi) = match &logging.file {
        Some(path) => (BoxMakeWriter::new(Mutex::new(open_log_file(path)?)), false),
        None => (BoxMakeWriter::new(std::io::stdout), true),
    };

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(ansi)
            .with_target(true)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Logging(format!("failed to install tracing subscriber: {e}")))
}

fn open_log_file(path: &Path) -> Result<std::fs::File, Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

pub fn log_startup(config: &Config) {
    info!(
        mode = config.mode.as_str(),
        source = %config.bundle.source_dir.display(),
        out_dir = %config.bundle.out_dir.display(),
        public_url = %config.bundle.public_url,
        watch = config.watch_enabled(),
        cache = config.bundle.cache,
        "sitepack starting"
    );
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    info!("======================================");
    info!("Development server started");
    info!("Listening on: http://{addr}");
    info!("Serving: {}", config.bundle.out_dir.display());
    if let Some(workers) = config.server.workers {
        info!("Worker threads: {workers}");
    }
    if let Some(max) = config.performance.max_connections {
        info!("Max connections: {max}");
    }
    info!("======================================");
}

pub fn log_bundle_started(source: &Path) {
    info!(source = %source.display(), "bundling");
}

pub fn log_bundle_complete(report: &BundleReport) {
    info!(
        entries = report.entries,
        assets = report.assets,
        written = report.written,
        unchanged = report.unchanged,
        removed = report.removed,
        elapsed_ms = report.elapsed.as_millis(),
        "built in {}ms",
        report.elapsed.as_millis()
    );
}

pub fn log_bundle_failed(err: &BuildError) {
    error!(error = %err, "build failed");
}

pub fn log_source_created(path: &Path) {
    warn!(path = %path.display(), "source directory missing, created it");
}

pub fn log_watching(path: &Path) {
    info!(path = %path.display(), "watching for changes");
}

pub fn log_changes_detected(count: usize) {
    info!(changes = count, "source change detected, rebuilding");
}

pub fn log_rebuild_requested(signal: &str) {
    info!(signal, "rebuild requested");
}

pub fn log_rewrite(from: &str, to: &str) {
    debug!(from, to, "directory index rewrite");
}

pub fn log_probe_failed(path: &Path, err: &std::io::Error) {
    debug!(path = %path.display(), error = %err, "filesystem check failed, passing through");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    debug!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    error!("Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    error!("{message}");
}

pub fn log_warning(message: &str) {
    warn!("{message}");
}

pub fn log_shutdown(signal: &str) {
    info!(signal, "shutting down");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &AccessLogFormat) {
    info!(target: ACCESS_TARGET, "{}", entry.format(format));
}
