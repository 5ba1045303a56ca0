// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,
    pub server: ServerConfig,
    pub bundle: BundleConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Run mode, selected once at process start
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Bundle once and exit
    Production,
    /// Bundle, watch and serve
    #[default]
    Development,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

/// Development server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    /// Document appended to directory paths by the rewrite middleware
    pub index_file: String,
}

/// Bundler configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BundleConfig {
    pub source_dir: PathBuf,
    pub entry_extensions: Vec<String>,
    /// Output root. Absolute once `Config::load_from` returns.
    pub out_dir: PathBuf,
    /// Main output document, served for the public URL root
    pub out_file: String,
    pub public_url: String,
    /// Unset means "follow the mode": on in development, off in production
    #[serde(default)]
    pub watch: Option<bool>,
    pub cache: bool,
    pub cache_dir: PathBuf,
    pub debounce_ms: u64,
}

impl BundleConfig {
    /// Public URL with exactly one trailing slash, e.g. `/` or `/blog/`
    pub fn public_url_base(&self) -> String {
        let trimmed = self.public_url.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.cache_dir.join("manifest.json")
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Log file path (optional, stdout if not set)
    #[serde(default)]
    pub file: Option<PathBuf>,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
}

/// Log line format
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Whole-connection timeout in seconds, 0 disables it
    pub request_timeout: u64,
    pub max_connections: Option<u64>,
}
