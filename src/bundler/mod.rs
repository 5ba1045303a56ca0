//! Bundler
//!
//! Builds the source directory into the output root and serves the result.
//! One `Bundler` is shared by the watcher, the signal handler and the asset
//! endpoint; builds take the write half of its lock, requests the read half.

pub mod assets;
pub mod build;
pub mod manifest;
pub mod serve;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::config::BundleConfig;
use crate::error::BuildError;
use crate::logger;

pub use manifest::Manifest;
pub use serve::AssetEndpoint;
pub use watch::{watch, WatchHandle};

/// Summary of one successful build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReport {
    /// Entry documents found
    pub entries: usize,
    /// Non-entry files referenced by entries or stylesheets
    pub assets: usize,
    pub written: usize,
    /// Outputs skipped because the cache said they were current
    pub unchanged: usize,
    /// Outputs of the previous build that no longer exist
    pub removed: usize,
    pub elapsed: Duration,
}

/// How the last build went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Pending,
    Built(BundleReport),
    Failed(String),
}

struct BuildState {
    manifest: Manifest,
    outcome: BuildOutcome,
}

pub struct Bundler {
    config: Arc<BundleConfig>,
    state: RwLock<BuildState>,
}

impl Bundler {
    /// Create a bundler, picking up the build cache left by an earlier run
    pub fn new(config: BundleConfig) -> Self {
        let manifest = if config.cache {
            Manifest::load(&config.manifest_path())
        } else {
            Manifest::default()
        };
        Self {
            config: Arc::new(config),
            state: RwLock::new(BuildState {
                manifest,
                outcome: BuildOutcome::Pending,
            }),
        }
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// Run one build. Requests wait until it finishes.
    ///
    /// The outcome is recorded either way; a failure keeps the previous
    /// manifest so the next build compares against the last good one.
    pub async fn bundle(&self) -> Result<BundleReport, BuildError> {
        let mut state = self.state.write().await;
        logger::log_bundle_started(&self.config.source_dir);

        let config = Arc::clone(&self.config);
        let previous = state.manifest.clone();
        let result = tokio::task::spawn_blocking(move || build::run(&config, &previous))
            .await
            .map_err(|e| BuildError::Join(e.to_string()))
            .and_then(|built| built);

        match result {
            Ok(output) => {
                logger::log_bundle_complete(&output.report);
                state.manifest = output.manifest;
                state.outcome = BuildOutcome::Built(output.report.clone());
                Ok(output.report)
            }
            Err(e) => {
                logger::log_bundle_failed(&e);
                state.outcome = BuildOutcome::Failed(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn outcome(&self) -> BuildOutcome {
        self.state.read().await.outcome.clone()
    }

    /// The request handler serving this bundler's output
    pub fn middleware(self: &Arc<Self>) -> AssetEndpoint {
        AssetEndpoint::new(Arc::clone(self))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// A source tree with two pages and a stylesheet, plus a config that
    /// builds it into `<tmp>/dist`
    pub fn blog() -> (TempDir, BundleConfig) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("_site");
        fs::create_dir_all(source.join("posts/my-post")).unwrap();
        fs::create_dir_all(source.join("styles")).unwrap();
        fs::write(
            source.join("index.html"),
            r#"<link rel="stylesheet" href="/styles/app.css"><h1>home</h1>"#,
        )
        .unwrap();
        fs::write(source.join("posts/my-post/index.html"), "<h1>my post</h1>").unwrap();
        fs::write(source.join("styles/app.css"), "h1 { color: red; }").unwrap();

        let config = BundleConfig {
            source_dir: source,
            entry_extensions: vec!["html".to_string()],
            out_dir: dir.path().join("dist"),
            out_file: "index.html".to_string(),
            public_url: "/".to_string(),
            watch: None,
            cache: true,
            cache_dir: dir.path().join(".cache"),
            debounce_ms: 20,
        };
        (dir, config)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::blog;
    use super::*;

    #[tokio::test]
    async fn test_outcome_is_recorded() {
        let (_dir, config) = blog();
        let bundler = Bundler::new(config);
        assert_eq!(bundler.outcome().await, BuildOutcome::Pending);

        let report = bundler.bundle().await.unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(report.assets, 1);
        assert_eq!(bundler.outcome().await, BuildOutcome::Built(report));
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_recovers() {
        let (dir, config) = blog();
        let source = config.source_dir.clone();
        let moved = dir.path().join("moved");
        std::fs::rename(&source, &moved).unwrap();

        let bundler = Bundler::new(config);
        assert!(matches!(
            bundler.bundle().await,
            Err(BuildError::SourceMissing(_))
        ));
        assert!(matches!(bundler.outcome().await, BuildOutcome::Failed(_)));

        std::fs::rename(&moved, &source).unwrap();
        bundler.bundle().await.unwrap();
        assert!(matches!(bundler.outcome().await, BuildOutcome::Built(_)));
    }

    #[tokio::test]
    async fn test_cache_survives_restart() {
        let (_dir, config) = blog();
        Bundler::new(config.clone()).bundle().await.unwrap();

        let report = Bundler::new(config).bundle().await.unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.unchanged, 3);
    }
}
