//! sitepack: a static-site bundler with a development asset server.
//!
//! In production mode the source directory is bundled once into the output
//! directory. In development mode the output directory is also served over
//! HTTP, with directory paths rewritten to their `index.html`, and rebuilt
//! when sources change.

pub mod app;
pub mod bundler;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod pipeline;
pub mod server;

pub use app::{build_pipeline, run_build_once, run_dev_server, DevServer};
pub use config::{Config, Mode};
pub use error::{BuildError, Error, Result};
