// Configuration module entry point
// Loads layered configuration: defaults, optional file, environment, command line

mod types;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::Error;

// Re-export public types
pub use types::{
    BundleConfig, Config, LogFormat, LoggingConfig, Mode, PerformanceConfig, ServerConfig,
};

/// Default config file name (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "sitepack";

/// Environment prefix, e.g. `SITEPACK__BUNDLE__OUT_DIR=public`
const ENV_PREFIX: &str = "SITEPACK";

/// Values taken from the command line, applied on top of every other source
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub mode: Option<Mode>,
    pub source_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub public_url: Option<String>,
    pub watch: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    /// Load configuration from specified file path (without extension).
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from(config_path: &str, overrides: &Overrides) -> Result<Self, Error> {
        let settings = config::Config::builder()
            .set_default("mode", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.index_file", "index.html")?
            .set_default("bundle.source_dir", "_site")?
            .set_default("bundle.entry_extensions", vec!["html"])?
            .set_default("bundle.out_dir", "dist")?
            .set_default("bundle.out_file", "index.html")?
            .set_default("bundle.public_url", "/")?
            .set_default("bundle.cache", true)?
            .set_default("bundle.cache_dir", ".cache")?
            .set_default("bundle.debounce_ms", 100)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "compact")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.request_timeout", 30)?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("bundle.entry_extensions"),
            )
            .set_override_option("mode", overrides.mode.map(Mode::as_str))?
            .set_override_option("bundle.source_dir", overrides.source_dir.as_deref().map(path_value))?
            .set_override_option("bundle.out_dir", overrides.out_dir.as_deref().map(path_value))?
            .set_override_option("bundle.public_url", overrides.public_url.clone())?
            .set_override_option("bundle.watch", overrides.watch)?
            .set_override_option("server.host", overrides.host.clone())?
            .set_override_option("server.port", overrides.port.map(i64::from))?
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        cfg.resolve_paths()?;
        Ok(cfg)
    }

    /// Make every bundle directory absolute against the working directory.
    /// The output root is fixed from here on.
    fn resolve_paths(&mut self) -> Result<(), Error> {
        self.bundle.source_dir = std::path::absolute(&self.bundle.source_dir)?;
        self.bundle.out_dir = std::path::absolute(&self.bundle.out_dir)?;
        self.bundle.cache_dir = std::path::absolute(&self.bundle.cache_dir)?;
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, Error> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|_| Error::InvalidAddress(addr))
    }

    /// Whether the bundler should watch sources for changes
    pub fn watch_enabled(&self) -> bool {
        match self.mode {
            Mode::Production => false,
            Mode::Development => self.bundle.watch.unwrap_or(true),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.bundle.out_dir
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
