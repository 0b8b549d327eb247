use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use copymedia::cli::Cli;
use copymedia::config::{ConfigFile, Overrides, RunConfig};
use copymedia::run::Runner;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!("Error on execution: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.log.as_deref(), cli.verbose)?;

    tracing::debug!("Initializing...");

    let (file, ifttt_url) = cli.resolve_callback();

    tracing::debug!("File arg: [{file:?}]");
    tracing::debug!("Log file arg: [{:?}]", cli.log);
    tracing::debug!("Config file arg: [{}]", cli.config.display());
    tracing::debug!("IFTTT URL: [{ifttt_url:?}]");
    tracing::debug!("Scan directory: [{:?}]", cli.scan);
    tracing::debug!("Series directory: [{:?}]", cli.dest);
    tracing::debug!("Movie directory: [{:?}]", cli.moviedest);
    tracing::debug!("TMDB key provided: [{}]", cli.tmdb.is_some());

    let config_file = ConfigFile::load(&cli.config)?;

    let overrides = Overrides {
        file,
        scan_dir: cli.scan.clone(),
        series_dir: cli.dest.clone(),
        movie_dir: cli.moviedest.clone(),
        ifttt_url,
        tmdb_key: cli.tmdb.clone(),
        plex: cli.plex_config(),
    };
    let run_config = RunConfig::resolve(overrides, config_file)?;

    Runner::new(run_config)?.execute()
}

/// Initialize logging. `RUST_LOG` wins when set; otherwise the verbose
/// flag picks the default level. With a log file, entries append to it
/// without ANSI escapes.
fn init_logging(logfile: Option<&Path>, verbose: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("copymedia=trace")
        } else {
            EnvFilter::new("copymedia=debug")
        }
    });

    match logfile {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file [{}]", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
        }
    }

    Ok(())
}
