use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::error::Error;

/// Default configuration file location, next to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "./CopyMedia.json";

/// Raw shape of the JSON configuration file. Every key is optional here;
/// required-ness is decided during [`RunConfig::resolve`] so that command
/// line overrides can fill the gaps first.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigFile {
    pub scan_dir: Option<PathBuf>,
    pub series_dir: Option<PathBuf>,
    /// Legacy alias for `seriesDir`, kept for old configuration files.
    pub move_dir: Option<PathBuf>,
    pub movie_dir: Option<PathBuf>,
    pub series: Option<Vec<RawRule>>,
}

impl ConfigFile {
    /// Open the configuration file and parse it as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("Using configuration file: [{}]", path.display());
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file [{}]", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse configuration file [{}]", path.display()))
    }
}

/// A series entry exactly as it appears in the configuration file,
/// before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRule {
    pub name: Option<String>,
    pub regex: Option<String>,
    pub replace: Option<String>,
    pub destination: Option<String>,
    /// Accepts either a JSON number or a numeric string.
    pub episode_num_sub: Option<serde_json::Value>,
}

/// A validated series rule: recognizes episodes of one show and describes
/// how to rename and where to file them. Built once per run, read-only
/// thereafter.
#[derive(Debug, Clone)]
pub struct SeriesRule {
    pub name: String,
    pub regex: Regex,
    pub replace: Option<String>,
    pub destination: Option<String>,
    pub episode_num_sub: Option<i64>,
}

/// Validate all configured series entries. A series must have at least a
/// name and a compilable regex pattern; `episode_num_sub`, when present,
/// must be an integer.
pub fn validate_series(series: &[RawRule]) -> Result<Vec<SeriesRule>, Error> {
    let mut rules = Vec::with_capacity(series.len());

    for show in series {
        tracing::trace!("Validate show [{show:?}]");

        let name = match show.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                tracing::error!("[{show:?}] has no name defined.");
                return Err(Error::RuleValidation { field: "name" });
            }
        };

        let regex = match show.regex.as_deref() {
            Some(pattern) => Regex::new(pattern).map_err(|e| {
                tracing::error!("[{name}] has an invalid regex pattern: {e}");
                Error::RuleValidation { field: "regex" }
            })?,
            None => {
                tracing::error!("[{name}] has no regex pattern defined.");
                return Err(Error::RuleValidation { field: "regex" });
            }
        };

        let episode_num_sub = match &show.episode_num_sub {
            None => None,
            Some(value) => Some(parse_episode_num_sub(value).ok_or_else(|| {
                tracing::error!("[{name}] has a non-integer episode_num_sub: [{value}]");
                Error::RuleValidation {
                    field: "episode_num_sub",
                }
            })?),
        };

        rules.push(SeriesRule {
            name,
            regex,
            replace: show.replace.clone(),
            destination: show.destination.clone(),
            episode_num_sub,
        });
    }

    Ok(rules)
}

fn parse_episode_num_sub(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Optional legacy media-server rescan settings.
#[derive(Debug, Clone)]
pub struct PlexConfig {
    pub url: String,
    pub section: String,
}

/// Call-time values that take precedence over the configuration file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub file: Option<PathBuf>,
    pub scan_dir: Option<PathBuf>,
    pub series_dir: Option<PathBuf>,
    pub movie_dir: Option<PathBuf>,
    pub ifttt_url: Option<String>,
    pub tmdb_key: Option<String>,
    pub plex: Option<PlexConfig>,
}

/// The immutable configuration for one run, resolved from command line
/// overrides and the configuration file. Constructed once and passed to
/// every component; nothing reads ambient state afterwards.
#[derive(Debug)]
pub struct RunConfig {
    /// Explicit file or directory to process instead of scanning.
    pub file: Option<PathBuf>,
    pub scan_dir: Option<PathBuf>,
    pub series_dir: PathBuf,
    pub movie_dir: PathBuf,
    pub ifttt_url: Option<String>,
    pub tmdb_key: Option<String>,
    pub plex: Option<PlexConfig>,
    pub series: Vec<SeriesRule>,
}

impl RunConfig {
    /// Merge overrides with the configuration file. An explicit call-time
    /// value always wins; required destinations missing from both sides
    /// abort before any file operation occurs.
    pub fn resolve(overrides: Overrides, config: ConfigFile) -> Result<Self, Error> {
        let mut scan_dir = overrides.scan_dir;

        if let Some(file) = &overrides.file {
            tracing::info!("File provided for processing: [{}]", file.display());
        } else {
            // Only use the value from the config file if no command line
            // argument was provided.
            if scan_dir.is_none() {
                scan_dir = config.scan_dir;
            }
            match &scan_dir {
                Some(dir) => {
                    tracing::info!(
                        "File not provided, but found directory to scan: [{}]",
                        dir.display()
                    );
                }
                None => {
                    tracing::error!("Must either specify a file or a directory to scan.");
                    return Err(Error::configuration("missing directory to scan"));
                }
            }
        }

        let series_dir = overrides
            .series_dir
            .or(config.series_dir)
            .or(config.move_dir)
            .ok_or_else(|| {
                tracing::error!(
                    "Destination series directory must be specified, either on the \
                     command line or in the configuration file."
                );
                Error::configuration("missing destination series directory")
            })?;
        tracing::debug!("Destination series directory: [{}]", series_dir.display());

        let movie_dir = overrides.movie_dir.or(config.movie_dir).ok_or_else(|| {
            tracing::error!(
                "Destination movie directory must be specified, either on the \
                 command line or in the configuration file."
            );
            Error::configuration("missing destination movie directory")
        })?;
        tracing::debug!("Destination movie directory: [{}]", movie_dir.display());

        let series = match &config.series {
            Some(series) => validate_series(series)?,
            None => {
                tracing::warn!("No series configured.");
                Vec::new()
            }
        };

        Ok(Self {
            file: overrides.file,
            scan_dir,
            series_dir,
            movie_dir,
            ifttt_url: overrides.ifttt_url,
            tmdb_key: overrides.tmdb_key,
            plex: overrides.plex,
            series,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: Option<&str>, regex: Option<&str>) -> RawRule {
        RawRule {
            name: name.map(str::to_string),
            regex: regex.map(str::to_string),
            ..RawRule::default()
        }
    }

    #[test]
    fn validate_series_requires_name() {
        // A regex by itself isn't enough.
        let series = [rule(None, Some(r"(.*)(Test Series)( - )(\d{1,})(.*)"))];
        let err = validate_series(&series).unwrap_err();
        assert!(matches!(err, Error::RuleValidation { field: "name" }));
    }

    #[test]
    fn validate_series_requires_regex() {
        // A name by itself isn't enough either.
        let series = [rule(Some("Test Series"), None)];
        let err = validate_series(&series).unwrap_err();
        assert!(matches!(err, Error::RuleValidation { field: "regex" }));
    }

    #[test]
    fn validate_series_accepts_well_formed_entries() {
        let series = [
            rule(Some("Test Series"), Some(r"(.*)(Test Series)( - )(\d{1,})(.*)")),
            rule(
                Some("Test Series S2"),
                Some(r"(.*)(Test Series S2)( - )(\d{1,})(.*)"),
            ),
        ];
        let rules = validate_series(&series).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "Test Series");
        assert!(rules[1].episode_num_sub.is_none());
    }

    #[test]
    fn validate_series_rejects_bad_pattern() {
        let series = [rule(Some("Broken"), Some("(unclosed"))];
        let err = validate_series(&series).unwrap_err();
        assert!(matches!(err, Error::RuleValidation { field: "regex" }));
    }

    #[test]
    fn episode_num_sub_accepts_number_or_numeric_string() {
        let mut entry = rule(Some("Show"), Some("Show - \\d+"));
        entry.episode_num_sub = Some(serde_json::json!(24));
        assert_eq!(validate_series(&[entry.clone()]).unwrap()[0].episode_num_sub, Some(24));

        entry.episode_num_sub = Some(serde_json::json!("24"));
        assert_eq!(validate_series(&[entry.clone()]).unwrap()[0].episode_num_sub, Some(24));

        entry.episode_num_sub = Some(serde_json::json!("twenty-four"));
        let err = validate_series(&[entry]).unwrap_err();
        assert!(matches!(err, Error::RuleValidation { field: "episode_num_sub" }));
    }
}
