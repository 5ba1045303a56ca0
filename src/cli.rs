use std::path::PathBuf;

use clap::{Parser, ValueHint};

use crate::config::{Mode, Overrides, DEFAULT_CONFIG_PATH};

/// Command-line arguments for the sitepack binary.
#[derive(Debug, Parser)]
#[command(
    name = "sitepack",
    version,
    about = "Bundle a static blog and serve it during development"
)]
pub struct Cli {
    /// Configuration file, with or without its extension.
    #[arg(
        long,
        env = "SITEPACK_CONFIG",
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: String,

    /// `production` builds once and exits; `development` builds, watches and serves.
    #[arg(long, env = "SITEPACK_ENV", value_enum)]
    pub mode: Option<Mode>,

    /// Directory the site generator writes to.
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub source: Option<PathBuf>,

    /// Build output directory, also the root the dev server serves.
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub out_dir: Option<PathBuf>,

    /// URL prefix the site is published under.
    #[arg(long, value_name = "URL")]
    pub public_url: Option<String>,

    /// Rebuild when sources change (development only).
    #[arg(long, overrides_with = "no_watch")]
    pub watch: bool,

    /// Build once even in development.
    #[arg(long, overrides_with = "watch")]
    pub no_watch: bool,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,
}

impl Cli {
    /// The flags given on the command line, for the top config layer
    pub fn overrides(&self) -> Overrides {
        let watch = if self.watch {
            Some(true)
        } else if self.no_watch {
            Some(false)
        } else {
            None
        };
        Overrides {
            mode: self.mode,
            source_dir: self.source.clone(),
            out_dir: self.out_dir.clone(),
            public_url: self.public_url.clone(),
            watch,
            host: self.host.clone(),
            port: self.port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "sitepack",
            "--mode",
            "production",
            "--out-dir",
            "public",
            "--port",
            "9000",
            "--no-watch",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.mode, Some(Mode::Production));
        assert_eq!(overrides.out_dir, Some(PathBuf::from("public")));
        assert_eq!(overrides.port, Some(9000));
        assert_eq!(overrides.watch, Some(false));
        assert_eq!(overrides.host, None);
    }

    #[test]
    fn test_last_watch_flag_wins() {
        let cli = Cli::try_parse_from(["sitepack", "--no-watch", "--watch"]).unwrap();
        assert_eq!(cli.overrides().watch, Some(true));
    }
}
