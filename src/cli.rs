use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::{DEFAULT_CONFIG_FILE, PlexConfig};
use crate::notify::IFTTT_URL_BASE;

#[derive(Debug, Parser)]
#[command(name = "copymedia")]
#[command(author, version, about = "Copy/transform large media files.")]
pub struct Cli {
    /// File to process. If not specified, all files within the scan
    /// directory are checked.
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Destination directory for series
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Destination directory for movies
    #[arg(short, long)]
    pub moviedest: Option<PathBuf>,

    /// Directory to scan
    #[arg(short, long)]
    pub scan: Option<PathBuf>,

    /// IFTTT trigger URL context and API key
    #[arg(short, long)]
    pub ifttt: Option<String>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// The Movie DB API key
    #[arg(short, long)]
    pub tmdb: Option<String>,

    /// Log file
    #[arg(short, long)]
    pub log: Option<PathBuf>,

    /// Media server base URL for the legacy rescan trigger
    #[arg(long)]
    pub plex_url: Option<String>,

    /// Media server library section id for the legacy rescan trigger
    #[arg(long, requires = "plex_url")]
    pub plex_section: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// If deluge is used, there will be three args, in this order:
    /// Torrent Id, Torrent Name, and Torrent Path
    #[arg(value_name = "DELUGE_ARGS")]
    pub deluge_args: Vec<String>,
}

impl Cli {
    /// Fold the download-client callback arguments into an explicit file
    /// path and a notification trigger URL. An explicit `--file` wins
    /// over the synthesized path; a trigger context in the callback args
    /// wins over `--ifttt`.
    pub fn resolve_callback(&self) -> (Option<PathBuf>, Option<String>) {
        let mut file = None;
        let mut trigger_url = None;

        if self.deluge_args.len() >= 3 {
            let torrent_name = &self.deluge_args[1];
            let torrent_path = &self.deluge_args[2];
            file = Some(Path::new(torrent_path).join(torrent_name));

            if let Some(context) = self.deluge_args.get(3) {
                trigger_url = Some(format!("{IFTTT_URL_BASE}/{context}"));
            }
        }

        if trigger_url.is_none() {
            if let Some(context) = &self.ifttt {
                trigger_url = Some(format!("{IFTTT_URL_BASE}/{context}"));
            }
        }

        if let Some(explicit) = &self.file {
            file = Some(explicit.clone());
        }

        (file, trigger_url)
    }

    pub fn plex_config(&self) -> Option<PlexConfig> {
        match (&self.plex_url, &self.plex_section) {
            (Some(url), Some(section)) => Some(PlexConfig {
                url: url.clone(),
                section: section.clone(),
            }),
            _ => None,
        }
    }
}
