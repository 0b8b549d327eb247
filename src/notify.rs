//! Outbound notifications: the IFTTT-style match notification and the
//! retained legacy media-server rescan trigger.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{PlexConfig, SeriesRule};

/// Base URL for webhook trigger contexts supplied on the command line or
/// through the download-client callback arguments.
pub const IFTTT_URL_BASE: &str = "https://maker.ifttt.com/trigger";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client: {e}");
            reqwest::blocking::Client::new()
        })
}

/// Send one notification naming the matched series. No-op when the match
/// list is empty. Non-2xx responses are logged by the caller as non-fatal.
pub fn send_match_notification(matches: &[(String, &SeriesRule)], trigger_url: &str) -> Result<()> {
    if matches.is_empty() {
        return Ok(());
    }

    let name_string = build_name_string(matches);

    tracing::debug!("Sending notification with name string: [{name_string}]");

    let response = http_client()
        .post(trigger_url)
        .form(&[("value1", name_string.as_str())])
        .send()
        .context("notification request failed")?;

    let status = response.status();
    tracing::debug!("Notification POST status: [{status}]");
    if !status.is_success() {
        anyhow::bail!("notification endpoint returned status {status}");
    }

    Ok(())
}

/// Distinct matched series names in first-encounter order, joined with
/// " and " for the notification body.
pub fn build_name_string(matches: &[(String, &SeriesRule)]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for (_, rule) in matches {
        if !names.contains(&rule.name.as_str()) {
            names.push(&rule.name);
        }
    }
    names.join(" and ")
}

/// Ask the media server to rescan each destination directory touched
/// during the run. Deprecated pathway kept for setups that still rely on
/// it; per-directory failures are logged without aborting the batch.
pub fn trigger_rescans(plex: &PlexConfig, destinations: &BTreeSet<PathBuf>) {
    let client = http_client();
    let url = format!(
        "{}/library/sections/{}/refresh",
        plex.url.trim_end_matches('/'),
        plex.section
    );

    for dir in destinations {
        let result = client
            .get(&url)
            .query(&[("path", dir.to_string_lossy().as_ref())])
            .send();

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Rescan triggered for [{}]", dir.display());
            }
            Ok(response) => {
                tracing::warn!(
                    "Rescan for [{}] returned status [{}]",
                    dir.display(),
                    response.status()
                );
            }
            Err(e) => {
                tracing::warn!("Rescan request for [{}] failed: {e:#}", dir.display());
            }
        }
    }
}
