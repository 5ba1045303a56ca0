use std::process::ExitCode;

use clap::Parser;
use sitepack::cli::Cli;
use sitepack::config::{Config, Mode};
use sitepack::{logger, Error};
use tracing::{dispatcher, error};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config, &cli.overrides())?;
    logger::init(&cfg.logging)?;
    logger::log_startup(&cfg);

    // Worker threads follow `server.workers`, CPU count otherwise
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async move {
        match cfg.mode {
            Mode::Production => sitepack::run_build_once(&cfg).await.map(|_| ()),
            Mode::Development => sitepack::run_dev_server(cfg).await,
        }
    })
}

/// Errors before the subscriber is installed still reach the terminal
fn report_error(e: &Error) {
    if dispatcher::has_been_set() {
        error!(error = %e, "sitepack failed");
    } else {
        eprintln!("sitepack: {e}");
    }
}
