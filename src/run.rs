//! One execution pass: collect candidates, dispatch files to series
//! matching and directories to movie classification, move everything into
//! place and fire notifications.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{RunConfig, SeriesRule};
use crate::error::Error;
use crate::matcher::{self, MatchOutcome};
use crate::meta::NameParser;
use crate::movie::{self, MovieProcessor};
use crate::notify;
use crate::tmdb::{self, TmdbClient};

/// Reserved scratch directory name, never treated as a candidate.
const TMP_DIR_NAME: &str = "tmp";

/// Drives one run over one file or one directory snapshot.
pub struct Runner {
    config: RunConfig,
    parser: NameParser,
    tmdb: Option<TmdbClient>,
}

impl Runner {
    pub fn new(config: RunConfig) -> Result<Self> {
        let parser = NameParser::new()?;
        let tmdb = config.tmdb_key.as_deref().map(TmdbClient::new);
        Ok(Self {
            config,
            parser,
            tmdb,
        })
    }

    /// Initiate the scanning, matching, transformation and movement of
    /// media. Single pass, no return value beyond success.
    pub fn execute(&self) -> Result<()> {
        tracing::debug!("Begin processing execution...");

        let (scan_base, files, dirs) = self.resolve_candidates()?;

        if files.is_empty() && dirs.is_empty() {
            tracing::info!("No files or directories found. Stopping.");
            return Ok(());
        }

        if !files.is_empty() {
            tracing::info!("Files found: {files:?}");
            self.process_files(&scan_base, &files)?;
        }
        if !dirs.is_empty() {
            tracing::info!("Directories found: {dirs:?}");
            self.process_dirs(&scan_base, &dirs)?;
        }

        tracing::debug!("Processing complete.");
        Ok(())
    }

    /// Resolve the input scope: an explicitly named file or directory, or
    /// one level of the scan directory split into files and
    /// subdirectories.
    fn resolve_candidates(&self) -> Result<(PathBuf, Vec<String>, Vec<String>)> {
        if let Some(path) = &self.config.file {
            let base = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let name = path
                .file_name()
                .with_context(|| format!("[{}] has no file name", path.display()))?
                .to_string_lossy()
                .into_owned();

            // The explicit path might be a directory, especially if it is
            // a movie. Check and differentiate.
            if path.is_file() {
                return Ok((base, vec![name], Vec::new()));
            }
            if path.is_dir() {
                return Ok((base, Vec::new(), vec![name]));
            }
            tracing::warn!("Specified path [{}] does not exist.", path.display());
            return Ok((base, Vec::new(), Vec::new()));
        }

        let scan_dir = self
            .config
            .scan_dir
            .as_ref()
            .ok_or_else(|| Error::configuration("missing directory to scan"))?;
        tracing::debug!("Scanning [{}] for files to process.", scan_dir.display());

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in fs::read_dir(scan_dir)
            .with_context(|| format!("failed to scan [{}]", scan_dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type()?;
            if file_type.is_file() {
                files.push(name);
            } else if file_type.is_dir() && name != TMP_DIR_NAME {
                dirs.push(name);
            }
        }
        files.sort();
        dirs.sort();

        Ok((scan_dir.clone(), files, dirs))
    }

    /// Process individual files: series episodes first, then a movie
    /// check for whatever didn't match a configured series.
    fn process_files(&self, scan_base: &Path, files: &[String]) -> Result<()> {
        let mut matches: Vec<(String, &SeriesRule)> = Vec::new();
        let mut nonmatches: Vec<&str> = Vec::new();
        for file in files {
            match matcher::match_file(file, &self.config.series) {
                MatchOutcome::Matched(rule) => matches.push((file.clone(), rule)),
                MatchOutcome::Unmatched => nonmatches.push(file.as_str()),
            }
        }

        if !matches.is_empty() {
            tracing::debug!("Found series matches to move: {matches:?}");
            let destinations = self.move_series(&matches, scan_base)?;

            if let Some(trigger_url) = &self.config.ifttt_url {
                if let Err(e) = notify::send_match_notification(&matches, trigger_url) {
                    tracing::warn!("Notification failed: {e:#}");
                }
            }

            if let Some(plex) = &self.config.plex {
                notify::trigger_rescans(plex, &destinations);
            }
        }

        if !nonmatches.is_empty() {
            tracing::debug!("Some files did not have matches. Checking if they are movies...");
            let movie_files: Vec<&str> = nonmatches
                .iter()
                .copied()
                .filter(|&file| tmdb::is_movie(file, &self.parser, self.tmdb.as_ref()))
                .collect();
            tracing::debug!("Found movies: {movie_files:?}");

            for file in movie_files {
                if let Err(e) = movie::move_into(&scan_base.join(file), &self.config.movie_dir) {
                    tracing::warn!("Could not move movie file [{file}]: {e:#}");
                }
            }
        }

        Ok(())
    }

    /// Move matching series files into their destination directories,
    /// renaming on the way. Returns the set of distinct destination
    /// directories touched.
    fn move_series(
        &self,
        matches: &[(String, &SeriesRule)],
        start_dir: &Path,
    ) -> Result<BTreeSet<PathBuf>> {
        let mut destinations = BTreeSet::new();

        for (file_name, rule) in matches {
            let dest_file_name = match matcher::build_name(file_name, rule) {
                Ok(name) => name,
                Err(e) => {
                    // Abort this file only, never the whole run.
                    tracing::warn!("Skipping [{file_name}]: {e:#}");
                    continue;
                }
            };

            let dest = self
                .config
                .series_dir
                .join(rule.destination.as_deref().unwrap_or(&rule.name));
            tracing::debug!("Destination directory: [{}]", dest.display());

            if !dest.exists() {
                tracing::info!("Destination does not exist; creating [{}]", dest.display());
                fs::create_dir_all(&dest)
                    .with_context(|| format!("failed to create [{}]", dest.display()))?;
            }

            let start_path = start_dir.join(file_name);
            let dest_path = dest.join(&dest_file_name);
            tracing::debug!(
                "Moving [{}] to [{}]...",
                start_path.display(),
                dest_path.display()
            );
            match movie::move_path(&start_path, &dest_path) {
                Ok(()) => {
                    tracing::info!(
                        "Successfully moved [{}] to [{}]",
                        start_path.display(),
                        dest_path.display()
                    );
                    destinations.insert(dest);
                }
                Err(e) => {
                    tracing::warn!("Could not move [{file_name}]: {e:#}");
                }
            }
        }

        Ok(destinations)
    }

    /// Directories are treated as potential movies only: query the
    /// metadata service per directory name and run the movie pipeline
    /// over everything that matches.
    fn process_dirs(&self, scan_base: &Path, dirs: &[String]) -> Result<()> {
        tracing::debug!("Checking directories to see if they are movies...");
        let movies: Vec<&String> = dirs
            .iter()
            .filter(|dir| tmdb::is_movie(dir.as_str(), &self.parser, self.tmdb.as_ref()))
            .collect();
        tracing::debug!("Found movies: {movies:?}");

        let processor = MovieProcessor::new(&self.parser, false);
        for movie in movies {
            let movie_dir = scan_base.join(movie);
            if let Err(e) = processor.process_movie(&movie_dir, &self.config.movie_dir) {
                tracing::warn!(
                    "Skipping movie directory [{}]: {e:#}",
                    movie_dir.display()
                );
            }
        }

        Ok(())
    }
}
