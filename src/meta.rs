//! Filename-parsing heuristics for raw media names.
//!
//! Release names mix the title with years, season/episode markers,
//! resolutions, codecs and release-group tags. [`NameParser`] pulls the
//! structured attributes out and keeps everything before the first
//! recognized marker as the title.

use anyhow::Result;
use regex::Regex;

/// Attributes parsed from a raw candidate name. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieMeta {
    pub title: String,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Parses raw media names into [`MovieMeta`]. Compiles its patterns once;
/// construct one per run and share it.
#[derive(Debug)]
pub struct NameParser {
    season_episode: Regex,
    season_x_episode: Regex,
    year: Regex,
    release_token: Regex,
}

impl NameParser {
    pub fn new() -> Result<Self> {
        let season_episode =
            Regex::new(r"(?i)(?:^|[\s._\-\[(])S(\d{1,2})[\s._\-]?E(\d{1,3})")?;

        let season_x_episode =
            Regex::new(r"(?:^|[\s._\-\[(])(\d{1,2})[xX](\d{2,3})(?:[\s._\-\])]|$)")?;

        // Boundaries are checked by hand so adjacent candidates such as
        // "1917.2019" are both seen.
        let year = Regex::new(r"(?:19|20)\d{2}")?;

        let release_token = Regex::new(
            r"(?i)(?:^|[\s._\-\[(])(\d{3,4}p|4k|uhd|hdtv|bluray|blu-ray|bdrip|brrip|bdremux|remux|webrip|web-dl|webdl|dvdrip|hdrip|x264|x265|h264|h265|hevc|avc|xvid|divx|av1|aac|ac3|eac3|dts|truehd|flac|atmos|8bit|10bit|hdr|hdr10|proper|repack|internal|limited|extended|unrated|remastered)(?:[\s._\-\])]|$)",
        )?;

        Ok(Self {
            season_episode,
            season_x_episode,
            year,
            release_token,
        })
    }

    /// Parse a raw name into title, year and season/episode attributes.
    pub fn parse(&self, name: &str) -> MovieMeta {
        tracing::trace!("Raw name: [{name}]");

        let mut meta = MovieMeta::default();

        // The title is whatever precedes the earliest recognized marker:
        // a season/episode token, the (last) year, or a release token.
        let mut cut = name.len();

        if let Some(caps) = self
            .season_episode
            .captures(name)
            .or_else(|| self.season_x_episode.captures(name))
        {
            meta.season = caps[1].parse().ok();
            meta.episode = caps[2].parse().ok();
            if let Some(m) = caps.get(0) {
                cut = cut.min(m.start());
            }
        }

        // Titles can contain a leading number, so the last plausible year
        // in the name wins over earlier ones.
        if let Some(m) = self
            .year
            .find_iter(name)
            .filter(|m| is_isolated_token(name, m.start(), m.end()))
            .last()
        {
            meta.year = m.as_str().parse().ok();
            cut = cut.min(m.start());
        }

        if let Some(m) = self.release_token.find(name) {
            cut = cut.min(m.start());
        }

        meta.title = clean_title(&name[..cut]);

        tracing::trace!("Cleaned name: [{meta:?}]");
        meta
    }
}

/// A token counts only when it stands alone between separators (or the
/// ends of the name); `12019` must not yield a year.
fn is_isolated_token(name: &str, start: usize, end: usize) -> bool {
    let separator = |c: char| " ._-()[]".contains(c);
    let before_ok = start == 0 || name[..start].chars().next_back().is_some_and(separator);
    let after_ok = end == name.len() || name[end..].chars().next().is_some_and(separator);
    before_ok && after_ok
}

/// Turn the raw title fragment into plain words: separators become spaces,
/// runs of whitespace collapse, stray punctuation at the ends is dropped.
fn clean_title(fragment: &str) -> String {
    let spaced = fragment.replace(['.', '_'], " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c == ' ' || c == '-' || c == '.' || c == '_')
        .to_string()
}
