//! Source watching
//!
//! `notify` delivers events on its own thread; they are forwarded into a tokio
//! channel and debounced so a burst of writes from the site generator causes
//! one rebuild.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Bundler;
use crate::config::BundleConfig;
use crate::logger;

/// Keeps the watcher alive. Dropping it stops watching.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Watch the bundler's source directory and rebuild on change.
///
/// A missing source directory is created first: `notify` cannot watch a path
/// that does not exist, and the site generator may not have run yet.
///
/// Must be called inside a tokio runtime.
pub fn watch(bundler: Arc<Bundler>) -> Result<WatchHandle, notify::Error> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        // The receiver is gone only after the handle is dropped
        let _ = tx.send(res);
    })?;
    let source_dir = &bundler.config().source_dir;
    if !source_dir.exists() {
        std::fs::create_dir_all(source_dir).map_err(notify::Error::io)?;
        logger::log_source_created(source_dir);
    }
    watcher.watch(source_dir, RecursiveMode::Recursive)?;
    logger::log_watching(source_dir);

    let task = tokio::spawn(async move {
        let debounce = Duration::from_millis(bundler.config().debounce_ms);

        while let Some(first) = rx.recv().await {
            let mut changes = relevant_changes(bundler.config(), first);
            loop {
                match tokio::time::timeout(debounce, rx.recv()).await {
                    Ok(Some(next)) => changes += relevant_changes(bundler.config(), next),
                    Ok(None) => return,
                    Err(_) => break,
                }
            }

            if changes > 0 {
                logger::log_changes_detected(changes);
                // Failures are logged and recorded by the bundler
                let _ = bundler.bundle().await;
            }
        }
    });

    Ok(WatchHandle {
        _watcher: watcher,
        task,
    })
}

/// Number of changed paths in `event` that should trigger a rebuild
fn relevant_changes(config: &BundleConfig, event: notify::Result<Event>) -> usize {
    let event = match event {
        Ok(event) => event,
        Err(e) => {
            logger::log_warning(&format!("Watch error: {e}"));
            return 0;
        }
    };
    if matches!(event.kind, EventKind::Access(_)) {
        return 0;
    }
    event
        .paths
        .iter()
        .filter(|path| !is_build_output(config, path))
        .count()
}

/// Writes into the output or cache directory must not retrigger a build
fn is_build_output(config: &BundleConfig, path: &Path) -> bool {
    path.starts_with(&config.out_dir) || path.starts_with(&config.cache_dir)
}
