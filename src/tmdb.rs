//! Metadata lookup against The Movie DB and the movie/episode classifier
//! built on top of it.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::meta::{MovieMeta, NameParser};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking client for title/year searches.
pub struct TmdbClient {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MovieSearchResponse {
    total_results: u64,
}

impl TmdbClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, TMDB_BASE_URL)
    }

    /// Point the client at a different endpoint. Used by tests.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client: {e}");
                reqwest::blocking::Client::new()
            });

        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Search for a movie by cleaned title and optional year, returning
    /// the reported result count.
    pub fn movie_result_count(&self, title: &str, year: Option<i32>) -> Result<u64> {
        let url = format!("{}/search/movie", self.base_url);

        let mut request = self.client.get(&url).query(&[
            ("api_key", self.api_key.as_str()),
            ("include_adult", "false"),
            ("query", title),
        ]);
        if let Some(year) = year {
            request = request.query(&[("year", year.to_string())]);
        }

        tracing::debug!("Performing query to the movie DB with media name [{title}]");
        let response = request.send().context("TMDB request failed")?;

        let status = response.status();
        tracing::debug!("TMDB GET status: [{status}]");
        if !status.is_success() {
            anyhow::bail!("TMDB search returned status {status}");
        }

        // A response with no usable body counts the same as zero results,
        // which the caller treats as "not a movie".
        let body: MovieSearchResponse = response
            .json()
            .context("TMDB response had no usable body")?;
        tracing::debug!("Number of results found: [{}]", body.total_results);

        Ok(body.total_results)
    }
}

/// Classification that needs no network call: a name without a parseable
/// year is never reliably searchable, and a name carrying both a season
/// and an episode marker is conclusively an episode.
pub fn static_verdict(meta: &MovieMeta) -> Option<bool> {
    if meta.year.is_none() {
        tracing::debug!("No year parsed from [{}]; not treating as a movie", meta.title);
        return Some(false);
    }
    if meta.season.is_some() && meta.episode.is_some() {
        tracing::debug!(
            "Season/episode marker parsed from [{}]; not a movie",
            meta.title
        );
        return Some(false);
    }
    None
}

/// Decide whether a raw candidate name denotes a movie. Static heuristics
/// run first so the network is only consulted when they are inconclusive;
/// fails open to `false` without an API key, an empty name, or on any
/// lookup failure.
pub fn is_movie(name: &str, parser: &NameParser, client: Option<&TmdbClient>) -> bool {
    let Some(client) = client else {
        tracing::debug!("TMDB API key not provided; skipping movie check for [{name}]");
        return false;
    };
    if name.is_empty() {
        return false;
    }

    let meta = parser.parse(name);
    if let Some(verdict) = static_verdict(&meta) {
        return verdict;
    }

    match client.movie_result_count(&meta.title, meta.year) {
        Ok(count) => count > 0,
        Err(e) => {
            tracing::warn!("TMDB lookup failed for [{name}]: {e:#}");
            false
        }
    }
}
